use std::collections::BTreeMap;
use std::path::Path;

use proptest::prelude::*;
use tempfile::TempDir;

use skv::core::hash::fingerprint;
use skv::core::manifest::{derive_name, parse_repo_arg};

fn write_tree(root: &Path, files: &BTreeMap<String, Vec<u8>>, reverse: bool) {
    let mut entries: Vec<_> = files.iter().collect();
    if reverse {
        entries.reverse();
    }
    for (rel, content) in entries {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

fn file_tree() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z]{1,6}(/[a-z]{1,6}){0,2}\\.md",
        prop::collection::vec(any::<u8>(), 0..64),
        1..8,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn fingerprint_ignores_creation_order(files in file_tree()) {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_tree(first.path(), &files, false);
        write_tree(second.path(), &files, true);

        prop_assert_eq!(
            fingerprint(first.path()).unwrap(),
            fingerprint(second.path()).unwrap()
        );
    }

    #[test]
    fn fingerprint_changes_with_any_content_edit(files in file_tree(), extra in any::<u8>()) {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &files, false);
        let before = fingerprint(dir.path()).unwrap();

        let (rel, content) = files.iter().next().unwrap();
        let mut edited = content.clone();
        edited.push(extra);
        std::fs::write(dir.path().join(rel), edited).unwrap();

        prop_assert_ne!(before, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn fingerprint_ignores_vcs_metadata(files in file_tree(), junk in prop::collection::vec(any::<u8>(), 0..64)) {
        let dir = TempDir::new().unwrap();
        write_tree(dir.path(), &files, false);
        let before = fingerprint(dir.path()).unwrap();

        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        std::fs::write(dir.path().join(".git/objects/pack"), junk).unwrap();

        prop_assert_eq!(before, fingerprint(dir.path()).unwrap());
    }

    #[test]
    fn parsed_ref_and_path_survive(
        reference in "[a-z0-9][a-z0-9.-]{0,10}",
        path in "[a-z]{1,8}(/[a-z]{1,8}){0,2}",
    ) {
        let arg = format!("https://example.com/org/pack.git#{reference}:{path}");
        let (repo, parsed_ref, parsed_path) = parse_repo_arg(&arg);
        prop_assert_eq!(repo.as_str(), "https://example.com/org/pack.git");
        prop_assert_eq!(parsed_ref.as_deref(), Some(reference.as_str()));
        prop_assert_eq!(parsed_path.as_deref(), Some(path.as_str()));

        let last = path.rsplit('/').next().unwrap();
        prop_assert_eq!(derive_name(&repo, parsed_path.as_deref()), last);
    }
}
