//! Git-backed [`SourceProvider`].
//!
//! Network operations (clone, sparse checkout, checkout) shell out to the
//! `git` binary so that credential helpers and sparse checkout behave exactly
//! as they do for the user. Each invocation runs under a hard timeout and the
//! child is killed if the timeout fires. Local reads (HEAD commit, tags,
//! blobs at HEAD) go through `git2` on a blocking thread under the same
//! timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use git2::{ErrorCode, Repository};
use tracing::{debug, info};

use super::{Checkout, SourceProvider};
use crate::config::{GitConfig, TimeoutsConfig};
use crate::error::{Result, SkvError};

const WORKTREE_DIR: &str = "repo";
const ORIGIN_PREFIX: &str = "refs/remotes/origin/";

/// Runs the `git` CLI with a per-call timeout.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git", Duration::from_secs(120))
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn from_config(git: &GitConfig, timeouts: &TimeoutsConfig) -> Self {
        Self::new(&git.binary, Duration::from_secs(timeouts.git_secs))
    }

    /// Whether the configured binary can be found.
    #[must_use]
    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let label = format!("git {}", args.join(" "));
        debug!(target: "git", command = %label, dir = ?dir, "running");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async {
            let mut cmd = tokio::process::Command::new(&self.binary);
            cmd.args(args)
                .env("GIT_TERMINAL_PROMPT", "0")
                .env("GCM_INTERACTIVE", "never")
                .stdin(Stdio::null())
                .kill_on_drop(true);
            if let Some(dir) = dir {
                cmd.current_dir(dir);
            }

            let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
                Err(_) => {
                    return Err(SkvError::Timeout {
                        operation: label.clone(),
                        after: self.timeout,
                    });
                }
                Ok(Err(err)) => {
                    return Err(SkvError::Provider(format!(
                        "failed to execute {}: {err}",
                        self.binary.display()
                    )));
                }
                Ok(Ok(output)) => output,
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(SkvError::Provider(format!(
                    "{label} failed: {}",
                    stderr.trim()
                )));
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }

    /// Run a local `git2` read on a blocking thread under the same timeout
    /// as subprocess calls.
    fn read_local<T, F>(&self, operation: &str, read: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let outcome = runtime.block_on(async {
            tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(read)).await
        });
        // A read still running past the deadline is left to finish on its own.
        runtime.shutdown_background();

        match outcome {
            Err(_) => Err(SkvError::Timeout {
                operation: operation.to_string(),
                after: self.timeout,
            }),
            Ok(Err(join)) => Err(SkvError::Provider(format!("{operation} failed: {join}"))),
            Ok(Ok(result)) => result,
        }
    }

    /// Branch `origin/HEAD` points at, or `HEAD` when it cannot be determined.
    fn default_branch(&self, worktree: &Path) -> String {
        let head = format!("{ORIGIN_PREFIX}HEAD");
        match self.run(Some(worktree), &["symbolic-ref", head.as_str()]) {
            Ok(out) => {
                let branch = out.trim().trim_start_matches(ORIGIN_PREFIX);
                if branch.is_empty() {
                    "HEAD".to_string()
                } else {
                    branch.to_string()
                }
            }
            Err(err) => {
                debug!(target: "git", error = %err, "default branch lookup failed");
                "HEAD".to_string()
            }
        }
    }
}

/// Refs come from the manifest; one starting with `-` would reach git as an option.
fn check_ref(reference: &str) -> Result<()> {
    if reference.starts_with('-') {
        return Err(SkvError::Validation(format!(
            "invalid ref {reference:?}: must not start with '-'"
        )));
    }
    Ok(())
}

// Manifest values always follow `--` so git never parses them as options.

fn clone_args<'a>(repo: &'a str, worktree: &'a str) -> [&'a str; 5] {
    ["clone", "--no-checkout", "--", repo, worktree]
}

fn sparse_args(subpath: &str) -> [&str; 4] {
    ["sparse-checkout", "set", "--", subpath]
}

fn checkout_args(target: &str) -> [&str; 3] {
    ["checkout", target, "--"]
}

impl SourceProvider for GitCli {
    fn clone_at(
        &self,
        repo: &str,
        reference: Option<&str>,
        subpath: Option<&str>,
    ) -> Result<Checkout> {
        if let Some(reference) = reference {
            check_ref(reference)?;
        }
        if !self.is_available() {
            return Err(SkvError::Provider(format!(
                "{} not found on PATH",
                self.binary.display()
            )));
        }
        let dir = tempfile::Builder::new().prefix("skv-clone-").tempdir()?;
        let worktree = dir.path().join(WORKTREE_DIR);
        let worktree_arg = worktree.to_string_lossy().into_owned();

        info!(target: "git", repo, reference = ?reference, subpath = ?subpath, "cloning");
        self.run(None, &clone_args(repo, &worktree_arg))?;

        if let Some(sub) = subpath {
            self.run(Some(&worktree), &["sparse-checkout", "init", "--cone"])?;
            self.run(Some(&worktree), &sparse_args(sub))?;
        }

        let target = match reference {
            Some(reference) => reference.to_string(),
            None => self.default_branch(&worktree),
        };
        self.run(Some(&worktree), &checkout_args(&target))?;

        Ok(Checkout::new(dir, WORKTREE_DIR))
    }

    fn head_commit(&self, checkout: &Checkout) -> Result<String> {
        let root = checkout.root().to_path_buf();
        self.read_local("head commit lookup", move || {
            let repo = Repository::open(&root)?;
            let commit = repo.head()?.peel_to_commit()?;
            Ok(commit.id().to_string())
        })
    }

    fn is_tag(&self, checkout: &Checkout, reference: &str) -> Result<bool> {
        let root = checkout.root().to_path_buf();
        let tag = format!("refs/tags/{reference}");
        self.read_local("tag lookup", move || {
            let repo = Repository::open(&root)?;
            match repo.find_reference(&tag) {
                Ok(_) => Ok(true),
                Err(err) if matches!(err.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                    Ok(false)
                }
                Err(err) => Err(err.into()),
            }
        })
    }

    fn read_file_at_head(&self, checkout: &Checkout, rel: &str) -> Result<Option<String>> {
        let root = checkout.root().to_path_buf();
        let rel = PathBuf::from(rel);
        self.read_local("file read at HEAD", move || {
            let repo = Repository::open(&root)?;
            let tree = repo.head()?.peel_to_tree()?;
            let entry = match tree.get_path(&rel) {
                Ok(entry) => entry,
                Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            let object = entry.to_object(&repo)?;
            let Some(blob) = object.as_blob() else {
                return Ok(None);
            };
            Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
        })
    }
}
