//! skv add - Declare a skill from a repository and vendor it

use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::lock::{LockEntry, Lockfile};
use crate::core::manifest::{ManifestEntry, SkillSource, derive_name, parse_repo_arg};
use crate::core::reconcile::{Policy, Reconciler};
use crate::error::{Result, SkvError};
use crate::security::path_policy::validate_path_component;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository, optionally with a ref and a path: <repo>[#ref][:path]
    pub repo: String,

    /// Skill name (defaults to the last path component or the repo name)
    #[arg(long)]
    pub name: Option<String>,

    /// Only record the skill in skv.toml; do not fetch it
    #[arg(long)]
    pub no_sync: bool,

    /// Accept a tag that moved since it was locked
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Serialize)]
struct AddReport {
    name: String,
    synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    lock: Option<LockEntry>,
}

pub fn run(ctx: &AppContext, args: &AddArgs) -> Result<()> {
    let mut manifest = ctx.load_manifest()?;

    let (repo, reference, subpath) = parse_repo_arg(&args.repo);
    let source = SkillSource::remote(&repo, reference.as_deref(), subpath.as_deref())?;
    let name = match args.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => derive_name(&repo, subpath.as_deref()),
    };
    validate_path_component(&name)
        .map_err(|violation| SkvError::Validation(format!("skill name {name:?}: {violation}")))?;
    if manifest.find(&name).is_some() {
        return Err(SkvError::Validation(format!(
            "skill {name:?} already exists in the manifest"
        )));
    }

    let entry = ManifestEntry::new(name.clone(), source);
    manifest.skills.push(entry.clone());
    manifest.validate()?;
    debug!(target: "add", skill = %name, %repo, ?reference, ?subpath, "adding");

    let locked = if args.no_sync {
        None
    } else {
        let mut lock = Lockfile::load_or_default(&ctx.lock_path())?;
        let provider = ctx.git();
        let vendor = ctx.vendor_store();
        let hasher = ctx.hasher();
        let links = ctx.links(&manifest);
        let reconciler = Reconciler::new(&ctx.repo_root, &provider, &vendor, &hasher)
            .force(args.force);

        std::fs::create_dir_all(vendor.root())?;
        let spinner = ctx.output.spinner(format!("Fetching {repo}"));
        let result = reconciler.reconcile(&entry, lock.get(&name), Policy::Normal);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        let locked = result?;
        links.link(&name)?;
        lock.upsert(locked.clone());
        lock.save(&ctx.lock_path())?;
        Some(locked)
    };

    // The manifest only changes once the fetch has succeeded.
    manifest.save(&ctx.manifest_path())?;
    info!(target: "add", skill = %name, synced = locked.is_some(), "added");

    let report = AddReport {
        name,
        synced: locked.is_some(),
        lock: locked,
    };
    ctx.output.emit(report, |report| {
        let mut layout = HumanLayout::new();
        match &report.lock {
            Some(lock) => layout.push_line(format!(
                "Added {} ({})",
                report.name,
                lock.short_commit().unwrap_or("local")
            )),
            None => layout.push_line(format!(
                "Added {} to the manifest; run `skv sync` to vendor it",
                report.name
            )),
        };
        layout
    })
}
