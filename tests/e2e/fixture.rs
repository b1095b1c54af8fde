//! Shared fixture for end-to-end workflows against real git repositories.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tempfile::TempDir;

/// Output of one `skv` invocation.
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout).expect("robot output should be valid JSON")
    }
}

/// A host repository plus any number of upstream git repositories.
pub struct E2EFixture {
    pub scenario: String,
    pub temp_dir: TempDir,
    pub root: PathBuf,
    started: Instant,
    step: usize,
}

impl E2EFixture {
    pub fn new(scenario: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("host");
        std::fs::create_dir_all(&root).expect("Failed to create host dir");
        println!("[E2E] Scenario {scenario}: {root:?}");
        Self {
            scenario: scenario.to_string(),
            temp_dir,
            root,
            started: Instant::now(),
            step: 0,
        }
    }

    pub fn log_step(&mut self, description: &str) {
        self.step += 1;
        println!(
            "[E2E] {} step {}: {description} (+{:?})",
            self.scenario,
            self.step,
            self.started.elapsed()
        );
    }

    pub fn run_skv(&self, args: &[&str]) -> CommandOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_skv"))
            .args(args)
            .current_dir(&self.root)
            .env("SKV_ROOT", &self.root)
            .env("XDG_CONFIG_HOME", self.temp_dir.path().join("xdg"))
            .env_remove("SKV_CONFIG")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run skv");
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
            success: output.status.success(),
        };
        println!("[E2E] skv {} -> {:?}", args.join(" "), result.code);
        result
    }

    pub fn init(&self) -> CommandOutput {
        self.run_skv(&["-q", "init"])
    }

    pub fn assert_success(&self, output: &CommandOutput, label: &str) {
        assert!(
            output.success,
            "{label} failed ({:?})\nstdout:\n{}\nstderr:\n{}",
            output.code, output.stdout, output.stderr
        );
    }

    pub fn assert_failure(&self, output: &CommandOutput, label: &str) {
        assert!(
            !output.success,
            "{label} unexpectedly succeeded\nstdout:\n{}",
            output.stdout
        );
    }

    /// Create an upstream repository with a `main` branch.
    pub fn upstream(&self, name: &str) -> Upstream {
        let path = self.temp_dir.path().join("upstream").join(name);
        std::fs::create_dir_all(&path).expect("Failed to create upstream dir");
        let upstream = Upstream { path };
        upstream.git(&["init", "-q"]);
        upstream.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        upstream
    }

    pub fn write_manifest(&self, content: &str) {
        std::fs::write(self.root.join("skv.toml"), content).expect("Failed to write manifest");
    }

    pub fn lock(&self) -> serde_json::Value {
        let text =
            std::fs::read_to_string(self.root.join("skv.lock")).expect("Failed to read lock");
        serde_json::from_str(&text).expect("lock should be valid JSON")
    }

    pub fn vendored(&self, name: &str, rel: &str) -> PathBuf {
        self.root.join(".skv/skills").join(name).join(rel)
    }
}

/// A real git repository used as a skill source.
pub struct Upstream {
    pub path: PathBuf,
}

impl Upstream {
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let file = self.path.join(rel);
        std::fs::create_dir_all(file.parent().unwrap()).expect("Failed to create dirs");
        std::fs::write(file, content).expect("Failed to write upstream file");
        self
    }

    /// Commit everything and return the new commit id.
    pub fn commit(&self, message: &str) -> String {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "-m", message]);
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn tag(&self, name: &str) {
        self.git(&["tag", "-f", name]);
    }

    pub fn git(&self, args: &[&str]) -> String {
        git_in(&self.path, args)
    }
}

fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=skv tests",
            "-c",
            "user.email=skv@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Real-git workflows are skipped when git is not installed.
pub fn git_available() -> bool {
    which::which("git").is_ok()
}
