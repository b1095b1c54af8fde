use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkvError};

/// Project-level config file, relative to the repository root.
pub const PROJECT_CONFIG: &str = ".skv/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub git: GitConfig,
}

impl Config {
    /// Defaults, then either `explicit_path`/`$SKV_CONFIG` or the global and
    /// project files, then `SKV_*` environment overrides.
    pub fn load(explicit_path: Option<&Path>, repo_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKV_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(SkvError::Config(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(repo_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("skv/config.toml"))
    }

    fn load_project(repo_root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&repo_root.join(PROJECT_CONFIG))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| SkvError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| SkvError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.limits {
            self.limits.merge(patch);
        }
        if let Some(patch) = patch.timeouts {
            self.timeouts.merge(patch);
        }
        if let Some(patch) = patch.git {
            self.git.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env_u64(&lookup, "SKV_MAX_FILE_BYTES")? {
            self.limits.max_file_bytes = value;
        }
        if let Some(value) = env_u64(&lookup, "SKV_MAX_SKILL_FILES")? {
            self.limits.max_skill_files = usize::try_from(value).map_err(|err| {
                SkvError::Config(format!("invalid SKV_MAX_SKILL_FILES value {value}: {err}"))
            })?;
        }
        if let Some(value) = env_u64(&lookup, "SKV_MAX_SKILL_BYTES")? {
            self.limits.max_skill_bytes = value;
        }
        if let Some(value) = env_u64(&lookup, "SKV_MAX_CHECKOUT_BYTES")? {
            self.limits.max_checkout_bytes = value;
        }
        if let Some(value) = env_u64(&lookup, "SKV_GIT_TIMEOUT_SECS")? {
            self.timeouts.git_secs = value;
        }
        if let Some(value) = env_u64(&lookup, "SKV_HASH_TIMEOUT_SECS")? {
            self.timeouts.hash_secs = value;
        }
        if let Some(value) = lookup("SKV_GIT_BIN").filter(|v| !v.trim().is_empty()) {
            self.git.binary = value;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub max_skill_files: usize,
    #[serde(default)]
    pub max_skill_bytes: u64,
    #[serde(default)]
    pub max_checkout_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            max_skill_files: 5000,
            max_skill_bytes: 20 * 1024 * 1024,
            max_checkout_bytes: 50 * 1024 * 1024,
        }
    }
}

impl LimitsConfig {
    fn merge(&mut self, patch: LimitsPatch) {
        if let Some(value) = patch.max_file_bytes {
            self.max_file_bytes = value;
        }
        if let Some(value) = patch.max_skill_files {
            self.max_skill_files = value;
        }
        if let Some(value) = patch.max_skill_bytes {
            self.max_skill_bytes = value;
        }
        if let Some(value) = patch.max_checkout_bytes {
            self.max_checkout_bytes = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Per git invocation.
    #[serde(default)]
    pub git_secs: u64,
    /// Per directory fingerprint.
    #[serde(default)]
    pub hash_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            git_secs: 120,
            hash_secs: 30,
        }
    }
}

impl TimeoutsConfig {
    fn merge(&mut self, patch: TimeoutsPatch) {
        if let Some(value) = patch.git_secs {
            self.git_secs = value;
        }
        if let Some(value) = patch.hash_secs {
            self.hash_secs = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default)]
    pub binary: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }
}

impl GitConfig {
    fn merge(&mut self, patch: GitPatch) {
        if let Some(value) = patch.binary {
            self.binary = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub limits: Option<LimitsPatch>,
    pub timeouts: Option<TimeoutsPatch>,
    pub git: Option<GitPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LimitsPatch {
    pub max_file_bytes: Option<u64>,
    pub max_skill_files: Option<usize>,
    pub max_skill_bytes: Option<u64>,
    pub max_checkout_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TimeoutsPatch {
    pub git_secs: Option<u64>,
    pub hash_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GitPatch {
    pub binary: Option<String>,
}

fn env_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value.trim().parse::<u64>().map(Some).map_err(|err| {
            SkvError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}
