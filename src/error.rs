//! Error types for skv.
//!
//! Every fallible operation returns [`Result`]. Variants are grouped into an
//! [`ErrorKind`] taxonomy that drives exit codes and robot-mode error codes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkvError>;

#[derive(Debug, Error)]
pub enum SkvError {
    #[error("{0}")]
    Usage(String),

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("{0}")]
    Validation(String),

    #[error("missing SKILL.md in {}", path.display())]
    MissingMarker { path: PathBuf },

    #[error("lock entry for {name:?} does not match the manifest: {reason}")]
    LockMismatch { name: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(
        "vendored content for {name:?} differs from lock (expected {expected}, got {actual}); use --refresh or --accept-local"
    )]
    Drift {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("vendored content for {name:?} is missing; use --refresh or --accept-local")]
    VendorMissing { name: String },

    #[error(
        "tag {tag:?} moved for {name:?} (locked {recorded}, remote {resolved}); re-run with --force to accept"
    )]
    TagMoved {
        name: String,
        tag: String,
        recorded: String,
        resolved: String,
    },

    #[error("{0}")]
    Provider(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout { operation: String, after: Duration },

    #[error("{0} cancelled")]
    Cancelled(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Coarse classification of [`SkvError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments or policy combinations; nothing was attempted.
    Usage,
    /// Manifest or content is structurally invalid.
    Validation,
    /// On-disk content diverges from the recorded state.
    Drift,
    /// Source-control operation failed or timed out.
    Provider,
    /// Post-copy re-validation or re-hash failed.
    Integrity,
    /// Filesystem, serialization, or configuration failure.
    Io,
}

impl SkvError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::Manifest(_)
            | Self::Validation(_)
            | Self::MissingMarker { .. }
            | Self::LockMismatch { .. }
            | Self::NotFound(_) => ErrorKind::Validation,
            Self::Drift { .. } | Self::VendorMissing { .. } | Self::TagMoved { .. } => {
                ErrorKind::Drift
            }
            Self::Provider(_) | Self::Git(_) | Self::Timeout { .. } | Self::Cancelled(_) => {
                ErrorKind::Provider
            }
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::TomlParse(_)
            | Self::TomlSerialize(_)
            | Self::Walk(_) => ErrorKind::Io,
        }
    }

    /// Stable snake_case code used in robot-mode error payloads.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::Manifest(_) => "invalid_manifest",
            Self::Validation(_) => "validation_failed",
            Self::MissingMarker { .. } => "missing_marker",
            Self::LockMismatch { .. } => "lock_mismatch",
            Self::NotFound(_) => "not_found",
            Self::Drift { .. } => "drift",
            Self::VendorMissing { .. } => "vendor_missing",
            Self::TagMoved { .. } => "tag_moved",
            Self::Provider(_) | Self::Git(_) => "provider",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled(_) => "cancelled",
            Self::Integrity(_) => "integrity",
            Self::Config(_) => "config",
            Self::Io(_) | Self::Walk(_) => "io",
            Self::Json(_) | Self::TomlParse(_) | Self::TomlSerialize(_) => "serialization",
        }
    }

    /// Wrap a validation failure of freshly vendored content.
    #[must_use]
    pub fn into_integrity(self, name: &str) -> Self {
        match self {
            Self::Timeout { .. } | Self::Cancelled(_) | Self::Integrity(_) => self,
            other => Self::Integrity(format!("vendored copy of {name:?}: {other}")),
        }
    }
}
