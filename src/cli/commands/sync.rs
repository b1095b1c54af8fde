//! skv sync - Bring vendored skills in line with the manifest

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::lock::{LockEntry, Lockfile};
use crate::core::reconcile::{Policy, Reconciler};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Never contact a source; fail unless everything matches the lock
    #[arg(long)]
    pub offline: bool,

    /// Fetch every remote skill again
    #[arg(long)]
    pub refresh: bool,

    /// Record the current vendored content as the new lock state
    #[arg(long)]
    pub accept_local: bool,

    /// Accept tags that moved since they were locked
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Serialize)]
struct SyncReport {
    policy: String,
    lock_written: bool,
    skills: Vec<LockEntry>,
}

pub fn run(ctx: &AppContext, args: &SyncArgs) -> Result<()> {
    let policy = Policy::from_flags(args.offline, args.refresh, args.accept_local)?;
    let manifest = ctx.load_manifest()?;
    let lock = Lockfile::load_or_default(&ctx.lock_path())?;

    let provider = ctx.git();
    let vendor = ctx.vendor_store();
    let hasher = ctx.hasher();
    let links = ctx.links(&manifest);
    let reconciler =
        Reconciler::new(&ctx.repo_root, &provider, &vendor, &hasher).force(args.force);

    let spinner = match policy {
        Policy::Offline => None,
        _ => ctx.output.spinner(format!("Syncing {} skills", manifest.skills.len())),
    };
    let result = reconciler.sync(&manifest, &lock, policy, &links);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let next = result?;

    let lock_written = policy != Policy::Offline;
    if lock_written {
        next.save(&ctx.lock_path())?;
    }
    info!(target: "sync", %policy, skills = next.skills.len(), lock_written, "synced");

    let report = SyncReport {
        policy: policy.to_string(),
        lock_written,
        skills: next.skills,
    };
    ctx.output.emit(report, |report| {
        let mut layout = HumanLayout::new();
        for skill in &report.skills {
            layout.bullet(&format!(
                "{} {}",
                skill.name,
                skill.short_commit().unwrap_or("local")
            ));
        }
        layout.push_line(format!(
            "Synced {} skills ({})",
            report.skills.len(),
            report.policy
        ));
        layout
    })
}
