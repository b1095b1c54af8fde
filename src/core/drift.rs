//! Read-only comparison of vendored content against the lock.

use std::fmt;
use std::fs;

use serde::Serialize;

use super::hash::ContentHasher;
use super::lock::{LockEntry, Lockfile};
use super::manifest::{Manifest, ManifestEntry, SkillSource};
use super::vendor::VendorStore;

/// How a skill's vendored copy relates to its lock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftState {
    Ok,
    Missing,
    Modified,
    Error,
}

impl DriftState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Missing => "missing",
            Self::Modified => "modified",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DriftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillStatus {
    pub name: String,
    pub state: DriftState,
    pub detail: String,
}

/// Classifies skills without touching the filesystem beyond reads.
#[derive(Debug)]
pub struct DriftDetector<'a> {
    vendor: &'a VendorStore,
    hasher: &'a ContentHasher,
}

impl<'a> DriftDetector<'a> {
    #[must_use]
    pub const fn new(vendor: &'a VendorStore, hasher: &'a ContentHasher) -> Self {
        Self { vendor, hasher }
    }

    pub fn classify(&self, entry: &ManifestEntry, prior: Option<&LockEntry>) -> SkillStatus {
        let (state, detail) = self.inspect(&entry.name, prior);
        SkillStatus {
            name: entry.name.clone(),
            state,
            detail,
        }
    }

    /// Status of every manifest skill, in manifest order.
    pub fn classify_all(&self, manifest: &Manifest, lock: &Lockfile) -> Vec<SkillStatus> {
        let index = lock.index();
        manifest
            .skills
            .iter()
            .map(|entry| self.classify(entry, index.get(entry.name.as_str()).copied()))
            .collect()
    }

    fn inspect(&self, name: &str, prior: Option<&LockEntry>) -> (DriftState, String) {
        let Some(prior) = prior else {
            return (DriftState::Missing, "not in lock file".to_string());
        };

        let dir = self.vendor.skill_dir(name);
        match fs::metadata(&dir) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return (DriftState::Missing, "vendor directory missing".to_string());
            }
            Err(err) => return (DriftState::Error, err.to_string()),
        }

        match self.hasher.fingerprint(&dir) {
            Err(err) => (DriftState::Error, err.to_string()),
            Ok(checksum) if checksum != prior.checksum => {
                (DriftState::Modified, "local changes detected".to_string())
            }
            Ok(_) => (DriftState::Ok, describe(prior)),
        }
    }
}

fn describe(prior: &LockEntry) -> String {
    match &prior.source {
        SkillSource::Local(_) => "local".to_string(),
        SkillSource::Remote(remote) => format!(
            "{} @ {}",
            remote.reference.as_deref().unwrap_or("default"),
            prior.short_commit().unwrap_or("-")
        ),
    }
}
