//! skv verify - Check every locked skill's vendored content

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::hash::ContentHasher;
use crate::core::lock::{LockEntry, Lockfile};
use crate::core::vendor::VendorStore;
use crate::error::{Result, SkvError};

#[derive(Args, Debug)]
pub struct VerifyArgs {}

#[derive(Serialize)]
struct VerifyReport {
    verified: Vec<String>,
}

pub fn run(ctx: &AppContext, _args: &VerifyArgs) -> Result<()> {
    let lock = Lockfile::load(&ctx.lock_path())?;
    let verified = verify_lock(&lock, &ctx.vendor_store(), &ctx.hasher())?;

    ctx.output.emit(VerifyReport { verified }, |report| {
        let mut layout = HumanLayout::new();
        layout.push_line(format!("Verified {} skills", report.verified.len()));
        layout
    })
}

/// Check each entry in lock order, stopping at the first mismatch.
fn verify_lock(lock: &Lockfile, vendor: &VendorStore, hasher: &ContentHasher) -> Result<Vec<String>> {
    lock.check_names()?;
    let mut verified = Vec::with_capacity(lock.skills.len());
    for entry in &lock.skills {
        verify_entry(entry, vendor, hasher)?;
        debug!(target: "verify", skill = %entry.name, "verified");
        verified.push(entry.name.clone());
    }
    Ok(verified)
}

fn verify_entry(entry: &LockEntry, vendor: &VendorStore, hasher: &ContentHasher) -> Result<()> {
    let dir = vendor.skill_dir(&entry.name);
    if !dir.is_dir() {
        return Err(SkvError::VendorMissing {
            name: entry.name.clone(),
        });
    }
    vendor.validate(&dir)?;
    let actual = hasher.fingerprint(&dir)?;
    if actual != entry.checksum {
        return Err(SkvError::Drift {
            name: entry.name.clone(),
            expected: entry.checksum.clone(),
            actual,
        });
    }
    Ok(())
}
