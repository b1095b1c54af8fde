//! skv status - Compare vendored skills with the lock file

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, column_widths};
use crate::core::drift::{DriftDetector, DriftState, SkillStatus};
use crate::core::lock::Lockfile;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub fn run(ctx: &AppContext, _args: &StatusArgs) -> Result<()> {
    let manifest = ctx.load_manifest()?;
    let lock = Lockfile::load_or_default(&ctx.lock_path())?;
    let vendor = ctx.vendor_store();
    let hasher = ctx.hasher();

    let statuses = DriftDetector::new(&vendor, &hasher).classify_all(&manifest, &lock);
    ctx.output.emit(statuses, |statuses| render(statuses))
}

fn render(statuses: &[SkillStatus]) -> HumanLayout {
    let mut layout = HumanLayout::new();
    if statuses.is_empty() {
        layout.push_line("No skills declared");
        return layout;
    }

    let rows: Vec<Vec<String>> = statuses
        .iter()
        .map(|status| {
            vec![
                status.name.clone(),
                status.state.to_string(),
                status.detail.clone(),
            ]
        })
        .collect();
    let widths = column_widths(&rows);
    for (row, status) in rows.iter().zip(statuses) {
        let state = format!("{:<width$}", row[1], width = widths[1]);
        let state = match status.state {
            DriftState::Ok => state.green(),
            DriftState::Missing => state.yellow(),
            DriftState::Modified | DriftState::Error => state.red(),
        };
        layout.push_line(format!(
            "{:<width$}  {state}  {}",
            row[0],
            row[2],
            width = widths[0]
        ));
    }
    layout
}
