use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::lock::LOCK_FILE;
use crate::core::manifest::MANIFEST_FILE;
use crate::core::vendor::{SKILL_MARKER, VENDOR_DIR};

/// Test fixture providing an isolated host repository.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {root:?}");

        Self { temp_dir, root }
    }

    /// Create a file with content relative to the repository root.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }

    /// Create a skill directory (`<dir>/SKILL.md`) and return the directory.
    #[must_use]
    pub fn create_skill(&self, dir: &str, content: &str) -> PathBuf {
        let marker = self.create_file(&format!("{dir}/{SKILL_MARKER}"), content);
        marker
            .parent()
            .map(Path::to_path_buf)
            .expect("marker has a parent")
    }

    /// Write `skv.toml`.
    pub fn write_manifest(&self, content: &str) {
        let _ = self.create_file(MANIFEST_FILE, content);
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    #[must_use]
    pub fn vendor_root(&self) -> PathBuf {
        self.root.join(VENDOR_DIR)
    }

    #[must_use]
    pub fn vendor_dir(&self, name: &str) -> PathBuf {
        self.vendor_root().join(name)
    }
}

impl Drop for UnitTestFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.root);
    }
}
