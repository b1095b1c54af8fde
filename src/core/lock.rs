//! The recorded state (`skv.lock`): resolved commits and content checksums.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::manifest::{LocalSource, RemoteSource, SkillSource};
use crate::error::{Result, SkvError};

pub const LOCK_FILE: &str = "skv.lock";

/// License discovered for a vendored skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spdx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One resolved skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLockEntry", into = "RawLockEntry")]
pub struct LockEntry {
    pub name: String,
    pub source: SkillSource,
    /// Resolved commit; always `None` for local sources.
    pub commit: Option<String>,
    pub checksum: String,
    pub license: Option<License>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawLockEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
    #[serde(default)]
    checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<License>,
}

impl TryFrom<RawLockEntry> for LockEntry {
    type Error = String;

    fn try_from(raw: RawLockEntry) -> std::result::Result<Self, Self::Error> {
        let source = match (raw.repo, raw.local) {
            (Some(repo), None) => SkillSource::Remote(RemoteSource {
                repo,
                reference: raw.reference.filter(|r| !r.is_empty()),
                subpath: raw.path.filter(|p| !p.is_empty()),
            }),
            (None, Some(path)) => SkillSource::Local(LocalSource { path }),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "lock entry {:?} has both repo and local",
                    raw.name
                ));
            }
            (None, None) => {
                return Err(format!(
                    "lock entry {:?} has neither repo nor local",
                    raw.name
                ));
            }
        };
        Ok(Self {
            name: raw.name,
            source,
            commit: raw.commit.filter(|c| !c.is_empty()),
            checksum: raw.checksum,
            license: raw.license,
        })
    }
}

impl From<LockEntry> for RawLockEntry {
    fn from(entry: LockEntry) -> Self {
        let mut raw = Self {
            name: entry.name,
            commit: entry.commit,
            checksum: entry.checksum,
            license: entry.license,
            ..Self::default()
        };
        match entry.source {
            SkillSource::Remote(remote) => {
                raw.repo = Some(remote.repo);
                raw.path = remote.subpath;
                raw.reference = remote.reference;
            }
            SkillSource::Local(local) => raw.local = Some(local.path),
        }
        raw
    }
}

impl LockEntry {
    /// Whether this entry was produced from `source`.
    #[must_use]
    pub fn matches(&self, source: &SkillSource) -> bool {
        &self.source == source
    }

    /// First seven characters of the commit, for display.
    #[must_use]
    pub fn short_commit(&self) -> Option<&str> {
        self.commit
            .as_deref()
            .map(|commit| commit.get(..7).unwrap_or(commit))
    }
}

/// All lock entries, kept sorted by name when saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub skills: Vec<LockEntry>,
}

impl Lockfile {
    pub fn new(mut skills: Vec<LockEntry>) -> Self {
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Self { skills }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SkvError::NotFound(format!("{} not found", path.display()))
            } else {
                SkvError::Io(err)
            }
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load the lock file, or an empty lock when it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write pretty JSON with a trailing newline, entries sorted by name.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut sorted = self.clone();
        sorted.skills.sort_by(|a, b| a.name.cmp(&b.name));
        let mut text = serde_json::to_string_pretty(&sorted)?;
        text.push('\n');
        fs::write(path, text)?;
        Ok(())
    }

    /// Entries keyed by name.
    #[must_use]
    pub fn index(&self) -> BTreeMap<&str, &LockEntry> {
        self.skills
            .iter()
            .map(|entry| (entry.name.as_str(), entry))
            .collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LockEntry> {
        self.skills.iter().find(|entry| entry.name == name)
    }

    /// Insert or replace the entry with the same name.
    pub fn upsert(&mut self, entry: LockEntry) {
        match self.skills.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.skills.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<LockEntry> {
        let index = self.skills.iter().position(|entry| entry.name == name)?;
        Some(self.skills.remove(index))
    }

    /// Reject nameless or duplicate entries.
    pub fn check_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.skills {
            if entry.name.is_empty() {
                return Err(SkvError::Validation(
                    "lock entry is missing a name".to_string(),
                ));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(SkvError::Validation(format!(
                    "duplicate lock entry {:?}",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str) -> LockEntry {
        LockEntry {
            name: name.to_string(),
            source: SkillSource::Remote(RemoteSource {
                repo: "https://example.com/pack".to_string(),
                reference: Some("main".to_string()),
                subpath: Some(format!("skills/{name}")),
            }),
            commit: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
            checksum: "abc".to_string(),
            license: Some(License {
                spdx: Some("MIT".to_string()),
                path: Some("LICENSE".to_string()),
            }),
        }
    }

    fn local(name: &str) -> LockEntry {
        LockEntry {
            name: name.to_string(),
            source: SkillSource::Local(LocalSource {
                path: format!("./{name}"),
            }),
            commit: None,
            checksum: "def".to_string(),
            license: None,
        }
    }

    #[test]
    fn save_sorts_and_uses_wire_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        let lock = Lockfile {
            skills: vec![local("b"), remote("a")],
        };
        lock.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let skills = value["skills"].as_array().unwrap();
        assert_eq!(skills[0]["name"], "a");
        assert_eq!(skills[0]["ref"], "main");
        assert_eq!(skills[0]["path"], "skills/a");
        assert_eq!(skills[0]["license"]["spdx"], "MIT");
        assert_eq!(skills[1]["name"], "b");
        assert_eq!(skills[1]["local"], "./b");
        assert!(skills[1].get("commit").is_none());
        assert!(skills[1].get("repo").is_none());

        let loaded = Lockfile::load(&path).unwrap();
        assert_eq!(loaded.skills, vec![remote("a"), local("b")]);
    }

    #[test]
    fn load_rejects_entries_with_both_sources() {
        let text = r#"{"skills":[{"name":"x","repo":"r","local":"./x","checksum":"c"}]}"#;
        assert!(serde_json::from_str::<Lockfile>(text).is_err());
    }

    #[test]
    fn load_or_default_handles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock = Lockfile::load_or_default(&dir.path().join(LOCK_FILE)).unwrap();
        assert!(lock.skills.is_empty());
        assert!(matches!(
            Lockfile::load(&dir.path().join(LOCK_FILE)).unwrap_err(),
            SkvError::NotFound(_)
        ));
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut lock = Lockfile::new(vec![remote("a")]);
        let mut updated = remote("a");
        updated.checksum = "new".to_string();
        lock.upsert(updated);
        lock.upsert(local("b"));
        assert_eq!(lock.skills.len(), 2);
        assert_eq!(lock.get("a").unwrap().checksum, "new");
        assert_eq!(lock.index().len(), 2);
        assert!(lock.remove("a").is_some());
        assert!(lock.get("a").is_none());
    }

    #[test]
    fn check_names_rejects_duplicates() {
        let lock = Lockfile {
            skills: vec![local("a"), local("a")],
        };
        assert!(lock.check_names().is_err());
        let nameless = Lockfile {
            skills: vec![local("")],
        };
        assert!(nameless.check_names().is_err());
        Lockfile::new(vec![local("a"), remote("b")]).check_names().unwrap();
    }

    #[test]
    fn matches_compares_full_source() {
        let entry = remote("a");
        assert!(entry.matches(&entry.source.clone()));
        let other = SkillSource::Remote(RemoteSource {
            repo: "https://example.com/pack".to_string(),
            reference: Some("v2".to_string()),
            subpath: Some("skills/a".to_string()),
        });
        assert!(!entry.matches(&other));
        assert_eq!(entry.short_commit(), Some("0123456"));
    }
}
