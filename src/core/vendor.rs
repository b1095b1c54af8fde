//! Vendored skill directories: validation and atomic replacement.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::LimitsConfig;
use crate::error::{Result, SkvError};
use crate::utils::fs::{copy_dir, is_vcs_dir};

/// File that marks a directory as a skill.
pub const SKILL_MARKER: &str = "SKILL.md";

/// Directory under the repository root that holds vendored skills.
pub const VENDOR_DIR: &str = ".skv/skills";

const STAGING_PREFIX: &str = ".skv-tmp-";
const LFS_SIGNATURE: &[u8] = b"version https://git-lfs.github.com/spec/v1";
const LFS_SNIFF_BYTES: usize = 200;

type CopyFn = fn(&Path, &Path) -> Result<()>;

/// Size and count bounds enforced on skills and checkouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_file_bytes: u64,
    pub max_skill_files: usize,
    pub max_skill_bytes: u64,
    pub max_checkout_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_skill_files: 5000,
            max_skill_bytes: 20 * 1024 * 1024,
            max_checkout_bytes: 50 * 1024 * 1024,
        }
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
            max_skill_files: config.max_skill_files,
            max_skill_bytes: config.max_skill_bytes,
            max_checkout_bytes: config.max_checkout_bytes,
        }
    }
}

/// Owns the vendor root and the rules a vendored directory must satisfy.
#[derive(Debug, Clone)]
pub struct VendorStore {
    root: PathBuf,
    limits: Limits,
    copy: CopyFn,
}

impl VendorStore {
    pub fn new(root: impl Into<PathBuf>, limits: Limits) -> Self {
        Self {
            root: root.into(),
            limits,
            copy: copy_dir,
        }
    }

    /// Replace the copy step used by [`VendorStore::materialize`].
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_copy(mut self, copy: CopyFn) -> Self {
        self.copy = copy;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Location of the vendored copy of `name`.
    #[must_use]
    pub fn skill_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Check that `dir` is a well-formed skill.
    ///
    /// Stops at the first violation: missing directory or marker, a symlink
    /// anywhere in the tree, too many files, an oversized file or skill, or a
    /// Git LFS pointer in place of real content.
    pub fn validate(&self, dir: &Path) -> Result<()> {
        let meta = fs::metadata(dir).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SkvError::Validation(format!("skill directory {} does not exist", dir.display()))
            } else {
                SkvError::Io(err)
            }
        })?;
        if !meta.is_dir() {
            return Err(SkvError::Validation(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let marker = dir.join(SKILL_MARKER);
        if !marker.is_file() {
            return Err(SkvError::MissingMarker {
                path: dir.to_path_buf(),
            });
        }

        let mut files = 0usize;
        let mut total = 0u64;
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_vcs_dir(entry));

        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                return Err(SkvError::Validation(format!(
                    "symlinks are not allowed: {}",
                    entry.path().display()
                )));
            }
            if !file_type.is_file() {
                continue;
            }

            files += 1;
            if files > self.limits.max_skill_files {
                return Err(SkvError::Validation(format!(
                    "skill has too many files (max {})",
                    self.limits.max_skill_files
                )));
            }

            let size = entry.metadata()?.len();
            if size > self.limits.max_file_bytes {
                return Err(SkvError::Validation(format!(
                    "file {} is too large ({size} bytes, max {})",
                    entry.path().display(),
                    self.limits.max_file_bytes
                )));
            }
            total += size;
            if total > self.limits.max_skill_bytes {
                return Err(SkvError::Validation(format!(
                    "skill exceeds size limit (max {} bytes)",
                    self.limits.max_skill_bytes
                )));
            }

            if is_lfs_pointer(entry.path())? {
                return Err(SkvError::Validation(format!(
                    "git lfs pointer files are not supported: {}",
                    entry.path().display()
                )));
            }
        }

        debug!(target: "vendor", dir = %dir.display(), files, bytes = total, "skill validated");
        Ok(())
    }

    /// Replace `dst` with a copy of `src`.
    ///
    /// The copy is staged next to `dst` and renamed into place, so `dst`
    /// is either the previous content or the complete new content.
    pub fn materialize(&self, src: &Path, dst: &Path) -> Result<()> {
        materialize_with(src, dst, self.copy)
    }

    /// Reject checkouts whose total regular-file size exceeds the limit.
    ///
    /// Counts everything under `checkout_root`, `.git` included.
    pub fn check_checkout_size(&self, checkout_root: &Path) -> Result<()> {
        let mut total = 0u64;
        for entry in WalkDir::new(checkout_root).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            total += entry.metadata()?.len();
            if total > self.limits.max_checkout_bytes {
                return Err(SkvError::Validation(format!(
                    "repository checkout exceeds size limit (max {} bytes)",
                    self.limits.max_checkout_bytes
                )));
            }
        }
        Ok(())
    }
}

/// Materialize with an injectable copy step.
pub(crate) fn materialize_with<F>(src: &Path, dst: &Path, copy: F) -> Result<()>
where
    F: FnOnce(&Path, &Path) -> Result<()>,
{
    let parent = dst.parent().ok_or_else(|| {
        SkvError::Validation(format!("{} has no parent directory", dst.display()))
    })?;
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)?;
    copy(src, staging.path())?;

    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_dir_all(dst)?;
    }
    let staged = staging.keep();
    if let Err(err) = fs::rename(&staged, dst) {
        let _ = fs::remove_dir_all(&staged);
        return Err(err.into());
    }

    info!(target: "vendor", src = %src.display(), dst = %dst.display(), "materialized");
    Ok(())
}

fn is_lfs_pointer(path: &Path) -> Result<bool> {
    let mut head = Vec::with_capacity(LFS_SNIFF_BYTES);
    File::open(path)?
        .take(LFS_SNIFF_BYTES as u64)
        .read_to_end(&mut head)?;
    Ok(head.starts_with(LFS_SIGNATURE))
}
