//! skv update - Fetch the latest commit for remote skills

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::HumanLayout;
use crate::core::lock::Lockfile;
use crate::core::reconcile::{Reconciler, UpdateSelection};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Skill to update (all remote skills when omitted)
    pub name: Option<String>,

    /// Update every remote skill that is not pinned to a commit
    #[arg(long)]
    pub all: bool,

    /// Fetch this ref instead of the one in the manifest (single skill only)
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    /// Accept tags that moved since they were locked
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Serialize)]
struct UpdateReport {
    updated: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &UpdateArgs) -> Result<()> {
    let selection =
        UpdateSelection::from_args(args.name.as_deref(), args.all, args.reference.as_deref())?;
    let manifest = ctx.load_manifest()?;
    let lock = Lockfile::load_or_default(&ctx.lock_path())?;

    let provider = ctx.git();
    let vendor = ctx.vendor_store();
    let hasher = ctx.hasher();
    let links = ctx.links(&manifest);
    let reconciler =
        Reconciler::new(&ctx.repo_root, &provider, &vendor, &hasher).force(args.force);

    let spinner = ctx.output.spinner("Updating skills");
    let result = reconciler.update(&manifest, &lock, &selection, &links);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let outcome = result?;
    if outcome.updated.is_empty() {
        info!(target: "update", "no skills to update");
    } else {
        outcome.lock.save(&ctx.lock_path())?;
        info!(target: "update", updated = outcome.updated.len(), "updated");
    }

    ctx.output.emit(
        UpdateReport {
            updated: outcome.updated,
        },
        |report| {
            let mut layout = HumanLayout::new();
            if report.updated.is_empty() {
                layout.push_line("No skills to update");
            } else {
                for name in &report.updated {
                    layout.bullet(name);
                }
                layout.push_line(format!("Updated {} skills", report.updated.len()));
            }
            layout
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::Output;
    use crate::config::Config;
    use crate::test_utils::UnitTestFixture;

    fn update_all() -> UpdateArgs {
        UpdateArgs {
            name: None,
            all: true,
            reference: None,
            force: false,
        }
    }

    #[test]
    fn nothing_to_update_leaves_the_lock_untouched() {
        let fixture = UnitTestFixture::new();
        let _ = fixture.create_skill("skills/house", "# house");
        fixture.write_manifest(
            r#"
[[skills]]
name = "house"
local = "./skills/house"

[[skills]]
name = "pinned"
repo = "https://example.com/org/pack"
ref = "0123456789abcdef0123456789abcdef01234567"
"#,
        );
        let ctx = AppContext::new(fixture.root.clone(), Config::default(), Output::quiet());

        run(&ctx, &update_all()).unwrap();
        assert!(!fixture.lock_path().exists());

        let compact = r#"{"skills":[]}"#;
        std::fs::write(fixture.lock_path(), compact).unwrap();
        run(&ctx, &update_all()).unwrap();
        assert_eq!(std::fs::read_to_string(fixture.lock_path()).unwrap(), compact);
    }
}
