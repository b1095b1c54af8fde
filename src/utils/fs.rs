//! Filesystem utilities.
//!
//! Helper functions for file operations.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, SkvError};

/// Directory name skipped by hashing, validation and copying.
pub const VCS_DIR: &str = ".git";

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Recursively copy regular files from `src` into `dst`, preserving
/// permission bits and recreating the directory structure.
///
/// `.git` directories and non-regular entries are skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_vcs_dir(entry));

    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).map_err(|err| {
            SkvError::Validation(format!("copy {}: {err}", entry.path().display()))
        })?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copy a single file, carrying its permission bits over.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst).map_err(|err| {
        SkvError::Io(std::io::Error::new(
            err.kind(),
            format!("copy {} -> {}: {err}", src.display(), dst.display()),
        ))
    })?;
    let permissions = fs::metadata(src)?.permissions();
    fs::set_permissions(dst, permissions)?;
    Ok(())
}

/// Whether two paths denote the same location once made absolute.
pub fn same_path(a: &Path, b: &Path) -> Result<bool> {
    Ok(absolute(a)? == absolute(b)?)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(crate::security::path_policy::normalize_path(&joined))
}

pub(crate) fn is_vcs_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == VCS_DIR
}
