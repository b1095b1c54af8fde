//! The declarative manifest (`skv.toml`).
//!
//! ```toml
//! [tools]
//! exclude = ["opencode"]
//!
//! [[skills]]
//! name = "skill-foo"
//! repo = "https://example.com/skill-pack"
//! ref = "main"
//! path = "skills/skill-foo"
//!
//! [[skills]]
//! name = "local-bar"
//! local = "./.skv/skills/local-bar"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkvError};
use crate::security::path_policy::{clean_subpath, validate_path_component};

pub const MANIFEST_FILE: &str = "skv.toml";

/// Remote source: a git repository, optional ref and optional subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub repo: String,
    /// `None` means the provider's default branch.
    pub reference: Option<String>,
    /// Normalized relative subdirectory, `None` for the repository root.
    pub subpath: Option<String>,
}

/// Local source: a directory inside the host repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    pub path: String,
}

/// Where a skill's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillSource {
    Remote(RemoteSource),
    Local(LocalSource),
}

impl SkillSource {
    /// Build a remote source, normalizing an empty ref and cleaning the subpath.
    pub fn remote(repo: &str, reference: Option<&str>, subpath: Option<&str>) -> Result<Self> {
        let repo = repo.trim();
        if repo.is_empty() {
            return Err(SkvError::Manifest("repo must not be empty".to_string()));
        }
        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string);
        let subpath = match subpath {
            Some(sub) => clean_subpath(sub)
                .map_err(|violation| SkvError::Manifest(violation.to_string()))?,
            None => None,
        };
        Ok(Self::Remote(RemoteSource {
            repo: repo.to_string(),
            reference,
            subpath,
        }))
    }

    pub fn local(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(SkvError::Manifest("local path is required".to_string()));
        }
        Ok(Self::Local(LocalSource {
            path: path.to_string(),
        }))
    }

    #[must_use]
    pub const fn as_remote(&self) -> Option<&RemoteSource> {
        match self {
            Self::Remote(remote) => Some(remote),
            Self::Local(_) => None,
        }
    }

    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// One declared skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub source: SkillSource,
}

impl ManifestEntry {
    pub fn new(name: impl Into<String>, source: SkillSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Tool-link settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools that never receive links, compared case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// The desired state: every skill the repository wants vendored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub tools: ToolsConfig,
    pub skills: Vec<ManifestEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawManifest {
    #[serde(default, skip_serializing_if = "is_default_tools")]
    tools: ToolsConfig,
    #[serde(default)]
    skills: Vec<RawEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawEntry {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<String>,
}

fn is_default_tools(tools: &ToolsConfig) -> bool {
    tools.exclude.is_empty()
}

impl RawEntry {
    fn into_entry(self, index: usize) -> Result<ManifestEntry> {
        let label = if self.name.is_empty() {
            format!("skills[{index}]")
        } else {
            format!("skill {:?}", self.name)
        };
        let has_repo = self.repo.as_deref().is_some_and(|r| !r.trim().is_empty());
        let has_local = self.local.as_deref().is_some_and(|l| !l.trim().is_empty());

        let source = match (has_repo, has_local) {
            (true, true) => {
                return Err(SkvError::Manifest(format!(
                    "{label} must set exactly one of repo or local"
                )));
            }
            (false, false) => {
                return Err(SkvError::Manifest(format!(
                    "{label} must set repo or local"
                )));
            }
            (false, true) => {
                if self.reference.is_some() || self.path.is_some() {
                    return Err(SkvError::Manifest(format!(
                        "{label}: ref and path only apply to repo sources"
                    )));
                }
                SkillSource::local(self.local.as_deref().unwrap_or_default())?
            }
            (true, false) => SkillSource::remote(
                self.repo.as_deref().unwrap_or_default(),
                self.reference.as_deref(),
                self.path.as_deref(),
            )
            .map_err(|err| SkvError::Manifest(format!("{label}: {}", strip_prefix(&err))))?,
        };
        Ok(ManifestEntry {
            name: self.name,
            source,
        })
    }
}

impl From<&ManifestEntry> for RawEntry {
    fn from(entry: &ManifestEntry) -> Self {
        let mut raw = Self {
            name: entry.name.clone(),
            ..Self::default()
        };
        match &entry.source {
            SkillSource::Remote(remote) => {
                raw.repo = Some(remote.repo.clone());
                raw.reference.clone_from(&remote.reference);
                raw.path.clone_from(&remote.subpath);
            }
            SkillSource::Local(local) => raw.local = Some(local.path.clone()),
        }
        raw
    }
}

fn strip_prefix(err: &SkvError) -> String {
    match err {
        SkvError::Manifest(msg) => msg.clone(),
        other => other.to_string(),
    }
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(text)?;
        let skills = raw
            .skills
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_entry(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tools: raw.tools,
            skills,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SkvError::NotFound(format!(
                    "{} not found (run `skv init` first)",
                    path.display()
                ))
            } else {
                SkvError::Io(err)
            }
        })?;
        Self::parse(&text).map_err(|err| match err {
            SkvError::TomlParse(parse) => {
                SkvError::Manifest(format!("{}: {parse}", path.display()))
            }
            other => other,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        let raw = RawManifest {
            tools: self.tools.clone(),
            skills: self.skills.iter().map(RawEntry::from).collect(),
        };
        Ok(toml::to_string_pretty(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Check that every entry has a unique name usable as a directory name.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (index, entry) in self.skills.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(SkvError::Manifest(format!(
                    "skills[{index}] is missing a name"
                )));
            }
            validate_path_component(&entry.name)
                .map_err(|violation| SkvError::Manifest(violation.to_string()))?;
            if !seen.insert(entry.name.as_str()) {
                return Err(SkvError::Manifest(format!(
                    "duplicate skill name {:?}",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ManifestEntry> {
        self.skills.iter().find(|entry| entry.name == name)
    }

    /// Remove `name`, returning the removed entry.
    pub fn remove(&mut self, name: &str) -> Option<ManifestEntry> {
        let index = self.skills.iter().position(|entry| entry.name == name)?;
        Some(self.skills.remove(index))
    }
}

/// Split an `add` argument of the form `<repo>[#ref][:path]`.
///
/// The ref follows the first `#`; the path follows the last `:` that is not
/// part of a URL scheme, an scp-style `host:` prefix or a port.
#[must_use]
pub fn parse_repo_arg(arg: &str) -> (String, Option<String>, Option<String>) {
    if let Some((repo, rest)) = arg.split_once('#') {
        let (reference, path) = match rest.rfind(':') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };
        return (
            repo.to_string(),
            non_empty(reference),
            path.and_then(non_empty),
        );
    }

    match path_colon(arg) {
        Some(idx) => (arg[..idx].to_string(), None, non_empty(&arg[idx + 1..])),
        None => (arg.to_string(), None, None),
    }
}

/// Colons up to the first `/` after any scheme belong to the scheme, an
/// scp-style host or a port; only a later one separates the skill path.
fn path_colon(repo: &str) -> Option<usize> {
    let idx = repo.rfind(':')?;
    let authority = repo.find("://").map_or(0, |scheme| scheme + 3);
    let path_start = authority + repo[authority..].find('/')?;
    (idx > path_start).then_some(idx)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Default skill name: the last path component, else the repo basename
/// without `.git`.
#[must_use]
pub fn derive_name(repo: &str, subpath: Option<&str>) -> String {
    if let Some(last) = subpath.and_then(|sub| sub.rsplit('/').find(|part| !part.is_empty())) {
        return last.to_string();
    }
    let trimmed = repo.trim_end_matches('/');
    let base = trimmed
        .rsplit(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    base.strip_suffix(".git").unwrap_or(base).to_string()
}
