//! Deterministic directory fingerprints.
//!
//! A fingerprint is the SHA-256 of one line per regular file,
//! `"<file sha256>  <mode octal>  <relative/path>\n"`, in sorted path order.
//! It depends only on file contents, permission bits and the relative path
//! set, so mtimes, inode identity and traversal order never leak in.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SkvError};
use crate::security::path_policy::to_slash;
use crate::utils::fs::is_vcs_dir;

/// Hex-encoded directory fingerprint.
pub type Checksum = String;

/// Limits applied to a single fingerprint computation.
#[derive(Debug, Clone, Default)]
pub struct HashBudget {
    timeout: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
}

impl HashBudget {
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    /// Abort the walk as soon as `flag` is set.
    #[must_use]
    pub fn cancelled_by(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

struct Deadline<'a> {
    started: Instant,
    budget: &'a HashBudget,
}

impl Deadline<'_> {
    fn check(&self) -> Result<()> {
        if let Some(flag) = &self.budget.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(SkvError::Cancelled("directory hash".to_string()));
            }
        }
        if let Some(timeout) = self.budget.timeout {
            if self.started.elapsed() >= timeout {
                return Err(SkvError::Timeout {
                    operation: "directory hash".to_string(),
                    after: timeout,
                });
            }
        }
        Ok(())
    }
}

/// Computes directory fingerprints. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    budget: HashBudget,
}

impl ContentHasher {
    #[must_use]
    pub const fn new(budget: HashBudget) -> Self {
        Self { budget }
    }

    /// Fingerprint `root` using this hasher's budget.
    pub fn fingerprint(&self, root: &Path) -> Result<Checksum> {
        fingerprint_with(root, &self.budget)
    }
}

/// Fingerprint `root` with no time limit.
pub fn fingerprint(root: &Path) -> Result<Checksum> {
    fingerprint_with(root, &HashBudget::unbounded())
}

/// Fingerprint `root`, aborting with `Timeout`/`Cancelled` when the budget runs out.
pub fn fingerprint_with(root: &Path, budget: &HashBudget) -> Result<Checksum> {
    let deadline = Deadline {
        started: Instant::now(),
        budget,
    };

    let mut files: Vec<(String, u32)> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_vcs_dir(entry));

    for entry in walker {
        deadline.check()?;
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).map_err(|err| {
            SkvError::Validation(format!("hash {}: {err}", entry.path().display()))
        })?;
        let mode = permission_bits(&entry.metadata()?);
        files.push((to_slash(rel), mode));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    let mut line = String::new();
    for (rel, mode) in &files {
        deadline.check()?;
        let data = fs::read(root.join(rel))?;
        let file_hash = hex::encode(Sha256::digest(&data));
        line.clear();
        let _ = writeln!(line, "{file_hash}  {mode:o}  {rel}");
        hasher.update(line.as_bytes());
    }

    let checksum = hex::encode(hasher.finalize());
    debug!(target: "hash", root = %root.display(), files = files.len(), %checksum, "fingerprint computed");
    Ok(checksum)
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
