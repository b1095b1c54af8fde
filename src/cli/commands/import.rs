//! skv import - Adopt an existing tool-local skill directory

use std::fs;
use std::path::Path;

use clap::Args;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::links::LinkManager;
use crate::core::lock::{LockEntry, Lockfile};
use crate::core::manifest::{Manifest, ManifestEntry, SkillSource};
use crate::core::reconcile::{Policy, Reconciler};
use crate::core::vendor::VENDOR_DIR;
use crate::error::{Result, SkvError};
use crate::security::path_policy::{resolve_local_path, validate_path_component};
use crate::utils::fs::ensure_dir;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Skill directory to adopt, relative to the repository root
    /// (for example .claude/skills/my-skill)
    pub path: String,

    /// Skill name (defaults to the directory name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct ImportReport {
    from: String,
    lock: LockEntry,
}

pub fn run(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let mut manifest = ctx.load_manifest()?;
    let mut lock = Lockfile::load_or_default(&ctx.lock_path())?;

    let src = resolve_local_path(&ctx.repo_root, &args.path)?;
    let name = import_name(&src, args.name.as_deref())?;
    if manifest.find(&name).is_some() {
        return Err(SkvError::Validation(format!(
            "skill {name:?} already exists in the manifest"
        )));
    }

    let vendor = ctx.vendor_store();
    let dst = vendor.skill_dir(&name);
    if fs::symlink_metadata(&src).is_ok_and(|meta| meta.file_type().is_symlink()) {
        return Err(SkvError::Validation(format!(
            "{} is a link, not a skill directory",
            src.display()
        )));
    }
    if dst.exists() {
        return Err(SkvError::Validation(format!(
            "{} already exists",
            dst.display()
        )));
    }
    vendor.validate(&src)?;
    let links = ctx.links(&manifest);
    links.check_targets(&name, Some(&src))?;

    ensure_dir(vendor.root())?;
    fs::rename(&src, &dst)?;
    info!(target: "import", skill = %name, from = %src.display(), "moved into vendor root");

    let locked = match adopt(ctx, &mut manifest, &mut lock, &links, &name) {
        Ok(locked) => locked,
        Err(err) => {
            restore(&links, &name, &src, &dst);
            return Err(err);
        }
    };

    let report = ImportReport {
        from: args.path.clone(),
        lock: locked,
    };
    ctx.output.emit(report, |report| {
        let mut layout = HumanLayout::new();
        layout.push_line(format!(
            "Imported {} from {}",
            report.lock.name, report.from
        ));
        layout
    })
}

/// Record the moved directory as a local skill, link it and persist.
fn adopt(
    ctx: &AppContext,
    manifest: &mut Manifest,
    lock: &mut Lockfile,
    links: &LinkManager,
    name: &str,
) -> Result<LockEntry> {
    let entry = ManifestEntry::new(
        name.to_string(),
        SkillSource::local(&format!("./{VENDOR_DIR}/{name}"))?,
    );
    manifest.skills.push(entry.clone());
    manifest.validate()?;

    let provider = ctx.git();
    let vendor = ctx.vendor_store();
    let hasher = ctx.hasher();
    let reconciler = Reconciler::new(&ctx.repo_root, &provider, &vendor, &hasher);
    let locked = reconciler.reconcile(&entry, None, Policy::Normal)?;
    links.link(name)?;

    lock.upsert(locked.clone());
    lock.save(&ctx.lock_path())?;
    manifest.save(&ctx.manifest_path())?;
    Ok(locked)
}

/// Move the directory back after a failed import. Best effort.
fn restore(links: &LinkManager, name: &str, src: &Path, dst: &Path) {
    if fs::symlink_metadata(src).is_ok_and(|meta| meta.file_type().is_symlink()) {
        if let Err(err) = fs::remove_file(src) {
            warn!(target: "import", path = %src.display(), error = %err, "cannot remove link");
        }
    }
    if let Err(err) = fs::rename(dst, src) {
        warn!(target: "import", skill = %name, error = %err, "cannot restore directory");
        return;
    }
    if let Err(err) = links.unlink(name) {
        warn!(target: "import", skill = %name, error = %err, "stale links left behind");
    }
    info!(target: "import", skill = %name, to = %src.display(), "import rolled back");
}

fn import_name(src: &Path, explicit: Option<&str>) -> Result<String> {
    let name = match explicit.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => src
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SkvError::Validation(format!("cannot derive a name from {}", src.display()))
            })?,
    };
    validate_path_component(&name)
        .map_err(|violation| SkvError::Validation(format!("skill name {name:?}: {violation}")))?;
    Ok(name)
}
