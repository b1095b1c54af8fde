//! skv init - Create the manifest, lock file and vendor directory

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::lock::Lockfile;
use crate::core::manifest::Manifest;
use crate::error::{Result, SkvError};
use crate::utils::fs::ensure_dir;

#[derive(Args, Debug)]
pub struct InitArgs {}

#[derive(Serialize)]
struct InitReport {
    manifest: String,
    lock: String,
    vendor_root: String,
}

pub fn run(ctx: &AppContext, _args: &InitArgs) -> Result<()> {
    let manifest_path = ctx.manifest_path();
    if manifest_path.exists() {
        return Err(SkvError::Validation(format!(
            "{} already exists",
            manifest_path.display()
        )));
    }

    Manifest::default().save(&manifest_path)?;
    let lock_path = ctx.lock_path();
    if !lock_path.exists() {
        Lockfile::default().save(&lock_path)?;
    }
    ensure_dir(ctx.vendor_root())?;
    info!(target: "init", root = %ctx.repo_root.display(), "initialized");

    let report = InitReport {
        manifest: manifest_path.display().to_string(),
        lock: lock_path.display().to_string(),
        vendor_root: ctx.vendor_root().display().to_string(),
    };
    ctx.output.emit(report, |report| {
        let mut layout = HumanLayout::new();
        layout
            .title("Initialized skv")
            .kv("Manifest", &report.manifest)
            .kv("Lock", &report.lock)
            .kv("Vendor root", &report.vendor_root);
        layout
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::Output;
    use crate::config::Config;
    use crate::test_utils::UnitTestFixture;

    #[test]
    fn init_creates_files_once() {
        let fixture = UnitTestFixture::new();
        let ctx = AppContext::new(fixture.root.clone(), Config::default(), Output::quiet());

        run(&ctx, &InitArgs {}).unwrap();
        assert!(fixture.manifest_path().is_file());
        assert!(fixture.vendor_root().is_dir());
        assert_eq!(Lockfile::load(&fixture.lock_path()).unwrap(), Lockfile::default());
        assert_eq!(Manifest::load(&fixture.manifest_path()).unwrap(), Manifest::default());

        let err = run(&ctx, &InitArgs {}).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
