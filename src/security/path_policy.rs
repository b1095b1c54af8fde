//! Path validation for manifest-controlled paths.
//!
//! Everything a manifest can name ends up as a filesystem path: skill names
//! address the vendor root, `path` selects a subdirectory of a checkout, and
//! `local` points at a directory inside the host repository. This module
//! keeps all three from escaping where they belong:
//! - Skill names must be a single, plain path component
//! - Subpaths must be relative and free of `..` segments
//! - Local sources must resolve inside the repository root
//!
//! # Example
//!
//! ```rust
//! use skv::security::path_policy::{clean_subpath, validate_path_component};
//!
//! assert!(validate_path_component("skill-foo").is_ok());
//! assert_eq!(clean_subpath("skills/./foo/").unwrap(), Some("skills/foo".to_string()));
//! assert!(clean_subpath("../escape").is_err());
//! ```

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SkvError};

/// Errors specific to path policy violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPolicyViolation {
    /// Path contains `..` segments
    TraversalAttempt { path: String },
    /// Path is absolute where a relative path is required
    NotRelative { path: String },
    /// Path escapes the allowed root directory
    EscapesRoot { path: PathBuf, root: PathBuf },
    /// Path component contains invalid characters
    InvalidComponent { component: String, reason: String },
}

impl std::fmt::Display for PathPolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TraversalAttempt { path } => {
                write!(f, "path escapes its root: {path}")
            }
            Self::NotRelative { path } => write!(f, "path must be relative: {path}"),
            Self::EscapesRoot { path, root } => {
                write!(f, "path {} escapes root {}", path.display(), root.display())
            }
            Self::InvalidComponent { component, reason } => {
                write!(f, "invalid name {component:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for PathPolicyViolation {}

impl From<PathPolicyViolation> for SkvError {
    fn from(violation: PathPolicyViolation) -> Self {
        Self::Validation(violation.to_string())
    }
}

/// Validate a single path component (a skill name or tool directory entry).
///
/// Rejects empty strings, `.`/`..`, directory separators and null bytes.
///
/// ```rust
/// use skv::security::path_policy::validate_path_component;
///
/// assert!(validate_path_component("my-skill").is_ok());
/// assert!(validate_path_component("..").is_err());
/// assert!(validate_path_component("foo/bar").is_err());
/// ```
pub fn validate_path_component(component: &str) -> std::result::Result<(), PathPolicyViolation> {
    let invalid = |reason: &str| PathPolicyViolation::InvalidComponent {
        component: component.to_string(),
        reason: reason.to_string(),
    };

    if component.is_empty() {
        return Err(invalid("empty component"));
    }
    if component.contains('\0') {
        return Err(invalid("contains null byte"));
    }
    if component == ".." || component == "." {
        return Err(PathPolicyViolation::TraversalAttempt {
            path: component.to_string(),
        });
    }
    if component.contains('/') || component.contains('\\') {
        return Err(invalid("contains directory separator"));
    }

    Ok(())
}

/// Normalize a repository subpath.
///
/// Returns `None` for an empty path or one that normalizes to the root
/// (`"."`), otherwise the forward-slash joined normal components.
pub fn clean_subpath(path: &str) -> std::result::Result<Option<String>, PathPolicyViolation> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.contains('\0') {
        return Err(PathPolicyViolation::InvalidComponent {
            component: trimmed.to_string(),
            reason: "contains null byte".to_string(),
        });
    }

    let unified = trimmed.replace('\\', "/");
    if unified.starts_with('/') || Path::new(trimmed).is_absolute() {
        return Err(PathPolicyViolation::NotRelative {
            path: trimmed.to_string(),
        });
    }

    let mut parts = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PathPolicyViolation::TraversalAttempt {
                    path: trimmed.to_string(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathPolicyViolation::NotRelative {
                    path: trimmed.to_string(),
                });
            }
        }
    }

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}

/// Resolve a manifest `local` path against the repository root.
///
/// Relative paths are joined onto `repo_root`; the normalized result must stay
/// under the root.
pub fn resolve_local_path(repo_root: &Path, local: &str) -> Result<PathBuf> {
    if local.trim().is_empty() {
        return Err(SkvError::Manifest("local path is required".to_string()));
    }
    let candidate = Path::new(local);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        repo_root.join(candidate)
    };
    let resolved = normalize_path(&joined);
    if !is_under_root(&resolved, repo_root) {
        return Err(PathPolicyViolation::EscapesRoot {
            path: resolved,
            root: repo_root.to_path_buf(),
        }
        .into());
    }
    Ok(resolved)
}

/// Normalize a path by removing `.` and resolving `..` lexically.
///
/// This does NOT resolve symlinks or check the filesystem.
///
/// ```rust
/// use std::path::{Path, PathBuf};
/// use skv::security::path_policy::normalize_path;
///
/// assert_eq!(normalize_path(Path::new("/foo/./bar/../baz")), PathBuf::from("/foo/baz"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                let last = normalized.components().next_back();
                match last {
                    None | Some(Component::RootDir | Component::Prefix(_)) => {}
                    _ => {
                        normalized.pop();
                    }
                }
            }
            Component::CurDir => {}
            _ => normalized.push(component),
        }
    }

    normalized
}

/// Check if a path is contained within a root directory (lexically).
#[must_use]
pub fn is_under_root(path: &Path, root: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(root))
}

/// Render a relative path with forward slashes regardless of platform.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path_component_valid() {
        assert!(validate_path_component("my-skill").is_ok());
        assert!(validate_path_component("skill_123").is_ok());
        assert!(validate_path_component("foo.bar").is_ok());
    }

    #[test]
    fn test_validate_path_component_rejects() {
        assert!(matches!(
            validate_path_component(".."),
            Err(PathPolicyViolation::TraversalAttempt { .. })
        ));
        assert!(validate_path_component(".").is_err());
        assert!(validate_path_component("").is_err());
        assert!(validate_path_component("foo/bar").is_err());
        assert!(validate_path_component("foo\\bar").is_err());
        assert!(validate_path_component("foo\0bar").is_err());
    }

    #[test]
    fn test_clean_subpath() {
        assert_eq!(clean_subpath("").unwrap(), None);
        assert_eq!(clean_subpath(".").unwrap(), None);
        assert_eq!(clean_subpath("./").unwrap(), None);
        assert_eq!(
            clean_subpath("skills/foo").unwrap(),
            Some("skills/foo".to_string())
        );
        assert_eq!(
            clean_subpath("./skills//foo/").unwrap(),
            Some("skills/foo".to_string())
        );
        assert_eq!(
            clean_subpath("skills\\foo").unwrap(),
            Some("skills/foo".to_string())
        );
    }

    #[test]
    fn test_clean_subpath_rejects_escapes() {
        assert!(matches!(
            clean_subpath("../escape"),
            Err(PathPolicyViolation::TraversalAttempt { .. })
        ));
        assert!(clean_subpath("skills/../../etc").is_err());
        assert!(clean_subpath("skills/../foo").is_err());
        assert!(matches!(
            clean_subpath("/etc/passwd"),
            Err(PathPolicyViolation::NotRelative { .. })
        ));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/foo/./bar/../baz")),
            PathBuf::from("/foo/baz")
        );
        assert_eq!(normalize_path(Path::new("/foo/..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("a/b/..")), PathBuf::from("a"));
        assert_eq!(normalize_path(Path::new("foo/..")), PathBuf::from(""));
    }

    #[test]
    fn test_is_under_root() {
        let root = Path::new("/data/repo");
        assert!(is_under_root(Path::new("/data/repo/skills/a"), root));
        assert!(is_under_root(Path::new("/data/repo"), root));
        assert!(!is_under_root(Path::new("/data/repo/../other"), root));
        assert!(!is_under_root(Path::new("/data"), root));
    }

    #[test]
    fn test_resolve_local_path() {
        let root = Path::new("/data/repo");
        assert_eq!(
            resolve_local_path(root, "./local-b").unwrap(),
            PathBuf::from("/data/repo/local-b")
        );
        assert_eq!(
            resolve_local_path(root, "/data/repo/x").unwrap(),
            PathBuf::from("/data/repo/x")
        );
        assert!(resolve_local_path(root, "../outside").is_err());
        assert!(resolve_local_path(root, "/etc").is_err());
        assert!(resolve_local_path(root, "").is_err());
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("a/b/c.txt")), "a/b/c.txt");
        assert_eq!(to_slash(Path::new("./a")), "a");
    }
}
