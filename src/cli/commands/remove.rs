//! skv remove - Drop a skill, its vendored copy and its links

use std::fs;

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::lock::Lockfile;
use crate::error::{Result, SkvError};
use crate::security::path_policy::validate_path_component;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Skill to remove
    pub name: String,
}

#[derive(Serialize)]
struct RemoveReport {
    name: String,
    vendor_removed: bool,
}

pub fn run(ctx: &AppContext, args: &RemoveArgs) -> Result<()> {
    let name = args.name.trim();
    validate_path_component(name)?;

    let mut manifest = ctx.load_manifest()?;
    if manifest.remove(name).is_none() {
        return Err(SkvError::NotFound(format!(
            "skill {name:?} not found in manifest"
        )));
    }

    let dir = ctx.vendor_store().skill_dir(name);
    let vendor_removed = dir.is_dir();
    if vendor_removed {
        fs::remove_dir_all(&dir)?;
    }
    ctx.links(&manifest).unlink(name)?;

    let mut lock = Lockfile::load_or_default(&ctx.lock_path())?;
    lock.remove(name);
    lock.save(&ctx.lock_path())?;
    manifest.save(&ctx.manifest_path())?;
    info!(target: "remove", skill = name, vendor_removed, "removed");

    let report = RemoveReport {
        name: name.to_string(),
        vendor_removed,
    };
    ctx.output.emit(report, |report| {
        let mut layout = HumanLayout::new();
        layout.push_line(format!("Removed {}", report.name));
        layout
    })
}
