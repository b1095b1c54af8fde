use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::cli::output::Output;
use crate::config::Config;
use crate::core::hash::{ContentHasher, HashBudget};
use crate::core::links::LinkManager;
use crate::core::lock::LOCK_FILE;
use crate::core::manifest::{MANIFEST_FILE, Manifest};
use crate::core::vendor::{Limits, VENDOR_DIR, VendorStore};
use crate::error::Result;
use crate::source::GitCli;

/// Everything a command needs: where the repository is, how it is
/// configured, and how to talk to the user.
pub struct AppContext {
    pub repo_root: PathBuf,
    pub config: Config,
    pub output: Output,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let repo_root = Self::find_repo_root()?;
        let config = Config::load(cli.config.as_deref(), &repo_root)?;
        Ok(Self::new(repo_root, config, Output::from_cli(cli)))
    }

    #[must_use]
    pub const fn new(repo_root: PathBuf, config: Config, output: Output) -> Self {
        Self {
            repo_root,
            config,
            output,
        }
    }

    fn find_repo_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("SKV_ROOT") {
            if !root.trim().is_empty() {
                return Ok(PathBuf::from(root));
            }
        }
        let cwd = std::env::current_dir()?;
        Ok(find_upwards(&cwd, MANIFEST_FILE).unwrap_or(cwd))
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.repo_root.join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.repo_root.join(LOCK_FILE)
    }

    #[must_use]
    pub fn vendor_root(&self) -> PathBuf {
        self.repo_root.join(VENDOR_DIR)
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest_path())
    }

    #[must_use]
    pub fn vendor_store(&self) -> VendorStore {
        VendorStore::new(self.vendor_root(), Limits::from(&self.config.limits))
    }

    #[must_use]
    pub fn hasher(&self) -> ContentHasher {
        let budget = match self.config.timeouts.hash_secs {
            0 => HashBudget::unbounded(),
            secs => HashBudget::with_timeout(Duration::from_secs(secs)),
        };
        ContentHasher::new(budget)
    }

    #[must_use]
    pub fn git(&self) -> GitCli {
        GitCli::from_config(&self.config.git, &self.config.timeouts)
    }

    #[must_use]
    pub fn links(&self, manifest: &Manifest) -> LinkManager {
        LinkManager::new(&self.repo_root, &self.vendor_root(), &manifest.tools.exclude)
    }
}

/// Nearest ancestor of `start` (inclusive) that contains the file `name`.
fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(name).is_file() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}
