//! E2E Scenario: Add Workflow
//!
//! - Adding a skill from a subdirectory vendors and links it
//! - A repository without SKILL.md at its root needs a :path
//! - A failed fetch leaves the manifest untouched

use super::fixture::{E2EFixture, git_available};

#[test]
fn test_add_subpath_skill() {
    if !git_available() {
        println!("[E2E] git not available, skipping");
        return;
    }
    let mut fixture = E2EFixture::new("add_subpath");
    let pack = fixture.upstream("pack");
    pack.write("skills/review/SKILL.md", "# Review\n")
        .write("README.md", "pack readme\n");
    let commit = pack.commit("initial");

    let output = fixture.init();
    fixture.assert_success(&output, "init");

    fixture.log_step("Add skills/review");
    let arg = format!("{}:skills/review", pack.url());
    let output = fixture.run_skv(&["--robot", "add", &arg]);
    fixture.assert_success(&output, "add");
    let json = output.json();
    assert_eq!(json["data"]["name"], "review");
    assert_eq!(json["data"]["synced"], true);
    assert_eq!(json["data"]["lock"]["commit"], commit.as_str());

    let manifest = std::fs::read_to_string(fixture.root.join("skv.toml")).unwrap();
    assert!(manifest.contains("name = \"review\""));
    assert!(manifest.contains("path = \"skills/review\""));
    assert!(fixture.vendored("review", "SKILL.md").is_file());
    assert!(!fixture.vendored("review", "README.md").exists());
    #[cfg(unix)]
    assert!(fixture.root.join(".claude/skills/review/SKILL.md").is_file());

    let output = fixture.run_skv(&["-q", "sync", "--offline"]);
    fixture.assert_success(&output, "offline sync after add");
}

#[test]
fn test_add_repo_root_without_marker() {
    if !git_available() {
        println!("[E2E] git not available, skipping");
        return;
    }
    let mut fixture = E2EFixture::new("add_missing_marker");
    let pack = fixture.upstream("pack");
    pack.write("skills/review/SKILL.md", "# Review\n");
    pack.commit("initial");

    let output = fixture.init();
    fixture.assert_success(&output, "init");
    let before = std::fs::read_to_string(fixture.root.join("skv.toml")).unwrap();

    fixture.log_step("Add repository root");
    let url = pack.url();
    let output = fixture.run_skv(&["add", &url, "--name", "review"]);
    fixture.assert_failure(&output, "add without path");
    assert!(output.stderr.contains("specify a :path"), "{}", output.stderr);

    let after = std::fs::read_to_string(fixture.root.join("skv.toml")).unwrap();
    assert_eq!(before, after);
    assert!(!fixture.vendored("review", "SKILL.md").exists());
}
