//! E2E Scenario: Update Workflow
//!
//! - Branch-tracking skills pick up new commits on update
//! - Moved tags are refused unless --force is given
//! - Commit-pinned skills are skipped by update --all

use super::fixture::{E2EFixture, Upstream, git_available};

fn tagged_fixture(scenario: &str) -> Option<(E2EFixture, Upstream, String)> {
    if !git_available() {
        println!("[E2E] git not available, skipping {scenario}");
        return None;
    }
    let mut fixture = E2EFixture::new(scenario);
    fixture.log_step("Create tagged upstream");
    let upstream = fixture.upstream("tagged");
    upstream.write("SKILL.md", "# Tagged v1\n");
    let first = upstream.commit("v1");
    upstream.tag("v1");

    let output = fixture.init();
    fixture.assert_success(&output, "init");
    Some((fixture, upstream, first))
}

#[test]
fn test_moved_tag_requires_force() {
    let Some((mut fixture, upstream, first)) = tagged_fixture("moved_tag") else {
        return;
    };
    fixture.write_manifest(&format!(
        "[[skills]]\nname = \"tagged\"\nrepo = \"{}\"\nref = \"v1\"\n",
        upstream.url()
    ));

    fixture.log_step("Initial sync at v1");
    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "sync");
    assert_eq!(fixture.lock()["skills"][0]["commit"], first.as_str());

    fixture.log_step("Move the tag upstream");
    upstream.write("SKILL.md", "# Tagged v1, retagged\n");
    let second = upstream.commit("retag");
    upstream.tag("v1");

    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "sync reuses the locked copy");
    assert_eq!(fixture.lock()["skills"][0]["commit"], first.as_str());

    let output = fixture.run_skv(&["--robot", "update", "tagged"]);
    fixture.assert_failure(&output, "update with moved tag");
    assert_eq!(output.json()["status"]["error"]["code"], "tag_moved");
    assert_eq!(fixture.lock()["skills"][0]["commit"], first.as_str());

    let output = fixture.run_skv(&["-q", "sync", "--refresh"]);
    fixture.assert_failure(&output, "refresh with moved tag");

    fixture.log_step("Accept the moved tag");
    let output = fixture.run_skv(&["-q", "update", "tagged", "--force"]);
    fixture.assert_success(&output, "forced update");
    assert_eq!(fixture.lock()["skills"][0]["commit"], second.as_str());
    let content = std::fs::read_to_string(fixture.vendored("tagged", "SKILL.md")).unwrap();
    assert!(content.contains("retagged"));
}

#[test]
fn test_update_follows_branch_and_skips_pins() {
    let Some((mut fixture, upstream, first)) = tagged_fixture("update_branch") else {
        return;
    };
    let url = upstream.url();
    fixture.write_manifest(&format!(
        "[[skills]]\nname = \"tracking\"\nrepo = \"{url}\"\n\n[[skills]]\nname = \"pinned\"\nrepo = \"{url}\"\nref = \"{first}\"\n"
    ));

    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "sync");

    fixture.log_step("New upstream commit");
    upstream.write("SKILL.md", "# Tagged v2\n");
    let second = upstream.commit("v2");

    let output = fixture.run_skv(&["--robot", "update"]);
    fixture.assert_success(&output, "update --all");
    assert_eq!(output.json()["data"]["updated"], serde_json::json!(["tracking"]));

    let lock = fixture.lock();
    assert_eq!(lock["skills"][0]["name"], "pinned");
    assert_eq!(lock["skills"][0]["commit"], first.as_str());
    assert_eq!(lock["skills"][1]["name"], "tracking");
    assert_eq!(lock["skills"][1]["commit"], second.as_str());
    assert!(lock["skills"][1].get("ref").is_none());
}
