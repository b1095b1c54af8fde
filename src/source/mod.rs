//! Source providers: where remote skill content comes from.
//!
//! The reconciler only talks to [`SourceProvider`]; the production
//! implementation is [`git::GitCli`].

pub mod git;

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

pub use git::GitCli;

/// A temporary working copy produced by [`SourceProvider::clone_at`].
///
/// The directory is removed when the checkout is dropped.
#[derive(Debug)]
pub struct Checkout {
    _dir: TempDir,
    root: PathBuf,
}

impl Checkout {
    /// Wrap a temporary directory whose working tree lives at `dir/<worktree>`.
    pub fn new(dir: TempDir, worktree: &str) -> Self {
        let root = dir.path().join(worktree);
        Self { _dir: dir, root }
    }

    /// Root of the working tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the skill: the root or the declared subpath below it.
    #[must_use]
    pub fn skill_root(&self, subpath: Option<&str>) -> PathBuf {
        match subpath {
            Some(sub) => self.root.join(sub),
            None => self.root.clone(),
        }
    }
}

/// Operations the reconciler needs from a content source.
pub trait SourceProvider {
    /// Clone `repo` and check out `reference` (default branch when `None`),
    /// restricted to `subpath` when one is given.
    fn clone_at(
        &self,
        repo: &str,
        reference: Option<&str>,
        subpath: Option<&str>,
    ) -> Result<Checkout>;

    /// Full commit identifier of the checked-out HEAD.
    fn head_commit(&self, checkout: &Checkout) -> Result<String>;

    /// Whether `reference` names a tag in the checkout.
    fn is_tag(&self, checkout: &Checkout, reference: &str) -> Result<bool>;

    /// Contents of `rel` at HEAD, `None` when the path does not exist there.
    fn read_file_at_head(&self, checkout: &Checkout, rel: &str) -> Result<Option<String>>;
}

/// A 40-character hex ref pins an exact commit.
#[must_use]
pub fn is_commit_ref(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_refs_are_forty_hex_chars() {
        assert!(is_commit_ref("0123456789abcdef0123456789abcdef01234567"));
        assert!(is_commit_ref("0123456789ABCDEF0123456789ABCDEF01234567"));
        assert!(!is_commit_ref("main"));
        assert!(!is_commit_ref("v1.0.0"));
        assert!(!is_commit_ref("0123456789abcdef"));
        assert!(!is_commit_ref("g123456789abcdef0123456789abcdef01234567"));
    }

    #[test]
    fn checkout_skill_root_joins_subpath() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_path_buf();
        let checkout = Checkout::new(dir, "repo");
        assert_eq!(checkout.root(), base.join("repo"));
        assert_eq!(checkout.skill_root(None), base.join("repo"));
        assert_eq!(
            checkout.skill_root(Some("skills/foo")),
            base.join("repo/skills/foo")
        );
    }
}
