//! E2E Scenario: Sync Workflow
//!
//! - Remote (branch + subpath) and local skills synced together
//! - Lock sorted by name, links created for every tool
//! - Offline verification, drift detection, refresh and accept-local

use super::fixture::{E2EFixture, git_available};

fn pack_fixture(scenario: &str) -> Option<(E2EFixture, String, String)> {
    if !git_available() {
        println!("[E2E] git not available, skipping {scenario}");
        return None;
    }
    let mut fixture = E2EFixture::new(scenario);
    fixture.log_step("Create upstream pack");
    let pack = fixture.upstream("pack");
    pack.write("LICENSE", "MIT License\n\nPermission is hereby granted...\n")
        .write("skills/alpha/SKILL.md", "# Alpha\n\nDo the alpha thing.\n")
        .write("skills/alpha/notes/usage.md", "usage notes\n")
        .write("skills/other/SKILL.md", "# Other\n");
    let commit = pack.commit("initial");

    fixture.log_step("Initialize host");
    let output = fixture.init();
    fixture.assert_success(&output, "init");
    std::fs::create_dir_all(fixture.root.join("local/beta")).unwrap();
    std::fs::write(fixture.root.join("local/beta/SKILL.md"), "# Beta\n").unwrap();

    let url = pack.url();
    fixture.write_manifest(&format!(
        "[[skills]]\nname = \"b\"\nlocal = \"./local/beta\"\n\n[[skills]]\nname = \"a\"\nrepo = \"{url}\"\nref = \"main\"\npath = \"skills/alpha\"\n"
    ));
    Some((fixture, url, commit))
}

#[test]
fn test_sync_remote_and_local() {
    let Some((mut fixture, url, commit)) = pack_fixture("sync_remote_and_local") else {
        return;
    };

    fixture.log_step("Sync");
    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "sync");

    let lock = fixture.lock();
    let skills = lock["skills"].as_array().unwrap();
    assert_eq!(skills.len(), 2);
    assert_eq!(skills[0]["name"], "a");
    assert_eq!(skills[0]["repo"], url.as_str());
    assert_eq!(skills[0]["ref"], "main");
    assert_eq!(skills[0]["path"], "skills/alpha");
    assert_eq!(skills[0]["commit"], commit.as_str());
    assert_eq!(skills[0]["license"]["spdx"], "MIT");
    assert_eq!(skills[1]["name"], "b");
    assert_eq!(skills[1]["local"], "./local/beta");
    assert!(skills[1].get("commit").is_none());

    assert!(fixture.vendored("a", "SKILL.md").is_file());
    assert!(fixture.vendored("a", "notes/usage.md").is_file());
    assert!(!fixture.vendored("a", ".git").exists());
    assert!(fixture.vendored("b", "SKILL.md").is_file());
    #[cfg(unix)]
    for tool_dir in [".claude/skills", ".codex/skills", ".opencode/skill"] {
        for name in ["a", "b"] {
            let link = fixture.root.join(tool_dir).join(name);
            assert!(
                std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink(),
                "{link:?} should be a symlink"
            );
            assert!(link.join("SKILL.md").is_file());
        }
    }

    fixture.log_step("Second sync reuses the vendored copy");
    let before = std::fs::read_to_string(fixture.root.join("skv.lock")).unwrap();
    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "resync");
    let after = std::fs::read_to_string(fixture.root.join("skv.lock")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_offline_drift_and_recovery() {
    let Some((mut fixture, _url, _commit)) = pack_fixture("offline_drift") else {
        return;
    };
    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "sync");
    let original = fixture.lock();

    fixture.log_step("Offline sync with untouched content");
    let output = fixture.run_skv(&["-q", "sync", "--offline"]);
    fixture.assert_success(&output, "offline sync");

    fixture.log_step("Edit vendored content");
    std::fs::write(fixture.vendored("a", "SKILL.md"), "# Alpha (edited)\n").unwrap();
    let output = fixture.run_skv(&["--robot", "sync", "--offline"]);
    fixture.assert_failure(&output, "offline sync after edit");
    assert_eq!(output.json()["status"]["error"]["code"], "drift");

    let output = fixture.run_skv(&["--robot", "status"]);
    fixture.assert_success(&output, "status");
    let statuses = output.json()["data"].clone();
    assert_eq!(statuses[0]["name"], "b");
    assert_eq!(statuses[0]["state"], "ok");
    assert_eq!(statuses[1]["name"], "a");
    assert_eq!(statuses[1]["state"], "modified");

    fixture.log_step("Accept local edits");
    let output = fixture.run_skv(&["-q", "sync", "--accept-local"]);
    fixture.assert_success(&output, "accept-local");
    let accepted = fixture.lock();
    assert_eq!(accepted["skills"][0]["commit"], original["skills"][0]["commit"]);
    assert_ne!(accepted["skills"][0]["checksum"], original["skills"][0]["checksum"]);

    fixture.log_step("Refresh restores upstream content");
    let output = fixture.run_skv(&["-q", "sync", "--refresh"]);
    fixture.assert_success(&output, "refresh");
    assert_eq!(fixture.lock(), original);
    let content = std::fs::read_to_string(fixture.vendored("a", "SKILL.md")).unwrap();
    assert!(content.contains("Do the alpha thing"));

    let output = fixture.run_skv(&["verify"]);
    fixture.assert_success(&output, "verify");
}

#[test]
fn test_missing_vendor_dir_offline() {
    let Some((mut fixture, _url, _commit)) = pack_fixture("offline_missing") else {
        return;
    };
    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_success(&output, "sync");

    fixture.log_step("Delete vendored copy");
    std::fs::remove_dir_all(fixture.root.join(".skv/skills/a")).unwrap();
    let output = fixture.run_skv(&["--robot", "sync", "--offline"]);
    fixture.assert_failure(&output, "offline sync without vendor dir");
    assert_eq!(output.json()["status"]["error"]["code"], "vendor_missing");

    let output = fixture.run_skv(&["-q", "sync"]);
    fixture.assert_failure(&output, "normal sync without vendor dir");

    let output = fixture.run_skv(&["-q", "sync", "--refresh"]);
    fixture.assert_success(&output, "refresh");
    assert!(fixture.vendored("a", "SKILL.md").is_file());
}
