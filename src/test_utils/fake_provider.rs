//! In-memory stand-in for a git host.
//!
//! Each fake repository is a plain directory plus a HEAD commit and a tag
//! table. Clones copy the directory into a fresh [`Checkout`] and remember
//! which commit they resolved to.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;

use crate::error::{Result, SkvError};
use crate::source::{Checkout, SourceProvider, is_commit_ref};
use crate::utils::fs::copy_dir;

/// Deterministic 40-hex commit id for tests.
#[must_use]
pub fn fake_commit(n: u32) -> String {
    format!("{n:040x}")
}

#[derive(Debug)]
struct RepoState {
    head: String,
    tags: BTreeMap<String, String>,
    head_only: BTreeMap<String, String>,
}

/// A fake upstream repository.
#[derive(Debug)]
pub struct FakeRepo {
    dir: TempDir,
    state: RefCell<RepoState>,
}

impl FakeRepo {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create fake repo dir"),
            state: RefCell::new(RepoState {
                head: fake_commit(1),
                tags: BTreeMap::new(),
                head_only: BTreeMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file into the working tree.
    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(path, content).expect("Failed to write fake repo file");
    }

    /// Make a file visible to `read_file_at_head` without placing it in checkouts.
    pub fn commit_head_file(&self, rel: &str, content: &str) {
        self.state
            .borrow_mut()
            .head_only
            .insert(rel.to_string(), content.to_string());
    }

    /// Move HEAD to `commit`.
    pub fn set_head(&self, commit: &str) {
        self.state.borrow_mut().head = commit.to_string();
    }

    /// Point tag `name` at `commit`.
    pub fn tag(&self, name: &str, commit: &str) {
        self.state
            .borrow_mut()
            .tags
            .insert(name.to_string(), commit.to_string());
    }

    fn resolve(&self, reference: Option<&str>) -> String {
        let state = self.state.borrow();
        match reference {
            Some(reference) => state.tags.get(reference).cloned().unwrap_or_else(|| {
                if is_commit_ref(reference) {
                    reference.to_string()
                } else {
                    state.head.clone()
                }
            }),
            None => state.head.clone(),
        }
    }
}

#[derive(Debug)]
struct CheckoutRecord {
    repo: Rc<FakeRepo>,
    commit: String,
}

/// [`SourceProvider`] backed by [`FakeRepo`]s, counting every call.
#[derive(Debug, Default)]
pub struct FakeProvider {
    repos: RefCell<BTreeMap<String, Rc<FakeRepo>>>,
    checkouts: RefCell<HashMap<PathBuf, CheckoutRecord>>,
    calls: Cell<usize>,
    fail_clone: RefCell<Option<String>>,
}

impl FakeProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The repository registered under `url`, created on first use.
    pub fn repo(&self, url: &str) -> Rc<FakeRepo> {
        Rc::clone(
            self.repos
                .borrow_mut()
                .entry(url.to_string())
                .or_insert_with(|| Rc::new(FakeRepo::new())),
        )
    }

    /// Total number of provider calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// Make every subsequent clone fail with `message`.
    pub fn fail_clones(&self, message: &str) {
        *self.fail_clone.borrow_mut() = Some(message.to_string());
    }

    fn record_call(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    fn record(&self, checkout: &Checkout) -> Result<std::cell::Ref<'_, CheckoutRecord>> {
        let checkouts = self.checkouts.borrow();
        if !checkouts.contains_key(checkout.root()) {
            return Err(SkvError::Provider(format!(
                "unknown checkout {}",
                checkout.root().display()
            )));
        }
        Ok(std::cell::Ref::map(checkouts, |map| &map[checkout.root()]))
    }
}

impl SourceProvider for FakeProvider {
    fn clone_at(
        &self,
        repo: &str,
        reference: Option<&str>,
        _subpath: Option<&str>,
    ) -> Result<Checkout> {
        self.record_call();
        if let Some(message) = self.fail_clone.borrow().as_ref() {
            return Err(SkvError::Provider(message.clone()));
        }
        let upstream = self
            .repos
            .borrow()
            .get(repo)
            .cloned()
            .ok_or_else(|| SkvError::Provider(format!("repository not found: {repo}")))?;

        let dir = TempDir::new()?;
        let checkout = Checkout::new(dir, "repo");
        fs::create_dir_all(checkout.root())?;
        copy_dir(upstream.path(), checkout.root())?;

        let commit = upstream.resolve(reference);
        self.checkouts.borrow_mut().insert(
            checkout.root().to_path_buf(),
            CheckoutRecord {
                repo: upstream,
                commit,
            },
        );
        Ok(checkout)
    }

    fn head_commit(&self, checkout: &Checkout) -> Result<String> {
        self.record_call();
        Ok(self.record(checkout)?.commit.clone())
    }

    fn is_tag(&self, checkout: &Checkout, reference: &str) -> Result<bool> {
        self.record_call();
        let record = self.record(checkout)?;
        let is_tag = record.repo.state.borrow().tags.contains_key(reference);
        Ok(is_tag)
    }

    fn read_file_at_head(&self, checkout: &Checkout, rel: &str) -> Result<Option<String>> {
        self.record_call();
        let record = self.record(checkout)?;
        if let Some(text) = record.repo.state.borrow().head_only.get(rel) {
            return Ok(Some(text.clone()));
        }
        let path = record.repo.path().join(rel);
        if path.is_file() {
            Ok(Some(fs::read_to_string(path)?))
        } else {
            Ok(None)
        }
    }
}
