//! Tool links: expose vendored skills where each consumer tool looks for them.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, SkvError};
use crate::utils::fs::same_path;

/// Consumer tools that receive skill links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Claude,
    Codex,
    OpenCode,
}

impl Tool {
    pub const ALL: [Self; 3] = [Self::Claude, Self::Codex, Self::OpenCode];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::OpenCode => "opencode",
        }
    }

    /// Directory, relative to the repository root, holding this tool's skills.
    #[must_use]
    pub const fn skills_dir(self) -> &'static str {
        match self {
            Self::Claude => ".claude/skills",
            Self::Codex => ".codex/skills",
            Self::OpenCode => ".opencode/skill",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = SkvError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SkvError::Validation(format!("unknown tool {s:?}")))
    }
}

/// Creates and removes the per-tool links for vendored skills.
#[derive(Debug, Clone)]
pub struct LinkManager {
    repo_root: PathBuf,
    vendor_root: PathBuf,
    excluded: HashSet<String>,
}

impl LinkManager {
    /// `exclude` holds tool names to skip, matched case-insensitively.
    pub fn new(repo_root: &Path, vendor_root: &Path, exclude: &[String]) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            vendor_root: vendor_root.to_path_buf(),
            excluded: exclude.iter().map(|tool| tool.trim().to_lowercase()).collect(),
        }
    }

    #[must_use]
    pub fn is_excluded(&self, tool: Tool) -> bool {
        self.excluded.contains(tool.as_str())
    }

    /// Link path for `name` under `tool`.
    #[must_use]
    pub fn link_path(&self, tool: Tool, name: &str) -> PathBuf {
        self.repo_root.join(tool.skills_dir()).join(name)
    }

    /// Tools that receive links.
    pub fn active_tools(&self) -> impl Iterator<Item = Tool> + '_ {
        Tool::ALL.into_iter().filter(|tool| !self.is_excluded(*tool))
    }

    /// Point every active tool's link for `name` at the vendored directory.
    pub fn link(&self, name: &str) -> Result<()> {
        let target = self.vendor_root.join(name);
        for tool in self.active_tools() {
            let link = self.link_path(tool, name);
            ensure_link(&target, &link)?;
            debug!(target: "links", %tool, link = %link.display(), "linked");
        }
        Ok(())
    }

    /// Fail if any active tool already has a real directory at the link path
    /// for `name`, other than `adopting` (a directory about to be moved away).
    pub fn check_targets(&self, name: &str, adopting: Option<&Path>) -> Result<()> {
        for tool in self.active_tools() {
            let link = self.link_path(tool, name);
            if !fs::symlink_metadata(&link).is_ok_and(|meta| meta.is_dir()) {
                continue;
            }
            let moving = match adopting {
                Some(src) => same_path(src, &link)?,
                None => false,
            };
            if !moving {
                return Err(SkvError::Validation(format!(
                    "refusing to replace directory {}",
                    link.display()
                )));
            }
        }
        Ok(())
    }

    /// Remove links for `name` from every tool. Directories are left alone.
    pub fn unlink(&self, name: &str) -> Result<()> {
        for tool in Tool::ALL {
            let link = self.link_path(tool, name);
            match fs::symlink_metadata(&link) {
                Ok(meta) if meta.is_dir() => {
                    debug!(target: "links", link = %link.display(), "not removing directory");
                }
                Ok(_) => remove_link(&link)?,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn ensure_link(target: &Path, link: &Path) -> Result<()> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.is_dir() => {
            return Err(SkvError::Validation(format!(
                "refusing to replace directory {}",
                link.display()
            )));
        }
        Ok(_) => remove_link(link)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let parent = link
        .parent()
        .ok_or_else(|| SkvError::Validation(format!("{} has no parent", link.display())))?;
    fs::create_dir_all(parent)?;
    let relative = relative_to(target, parent);
    symlink_dir(&relative, link)?;
    Ok(())
}

#[cfg(windows)]
fn remove_link(link: &Path) -> Result<()> {
    // Directory symlinks on Windows are removed with remove_dir.
    fs::remove_file(link).or_else(|_| fs::remove_dir(link))?;
    Ok(())
}

#[cfg(not(windows))]
fn remove_link(link: &Path) -> Result<()> {
    fs::remove_file(link)?;
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Path to `target` expressed relative to directory `base`.
///
/// Both paths are expected to be absolute or both relative to the same root.
fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<_> = target.components().collect();
    let base: Vec<_> = base.components().collect();
    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target.iter().collect();
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component);
    }
    relative
}
