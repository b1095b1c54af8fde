//! skv list - Show locked skills

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, column_widths, emit_json};
use crate::core::lock::{LockEntry, Lockfile};
use crate::core::manifest::SkillSource;
use crate::error::{Result, SkvError};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print the lock entries as JSON
    #[arg(long, conflicts_with = "names")]
    pub json: bool,

    /// Print only skill names, one per line
    #[arg(long)]
    pub names: bool,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let lock = Lockfile::load(&ctx.lock_path()).map_err(|err| match err {
        SkvError::NotFound(msg) => SkvError::NotFound(format!("{msg} (run `skv sync` first)")),
        other => other,
    })?;

    if args.json {
        return emit_json(&lock.skills);
    }
    if args.names && !ctx.output.is_robot() {
        for entry in &lock.skills {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    ctx.output.emit(lock.skills, |skills| render_table(skills))
}

fn render_table(skills: &[LockEntry]) -> HumanLayout {
    let mut layout = HumanLayout::new();
    if skills.is_empty() {
        layout.push_line("No skills locked");
        return layout;
    }

    let mut rows = vec![vec![
        "NAME".to_string(),
        "SOURCE".to_string(),
        "REF".to_string(),
        "COMMIT".to_string(),
        "LICENSE".to_string(),
    ]];
    rows.extend(skills.iter().map(table_row));
    let widths = column_widths(&rows);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        layout.row(&cells, &widths);
    }
    layout
}

fn table_row(entry: &LockEntry) -> Vec<String> {
    let (source, reference) = match &entry.source {
        SkillSource::Remote(remote) => {
            let source = match &remote.subpath {
                Some(sub) => format!("{}:{sub}", remote.repo),
                None => remote.repo.clone(),
            };
            (source, remote.reference.clone().unwrap_or_else(|| "-".to_string()))
        }
        SkillSource::Local(local) => (local.path.clone(), "-".to_string()),
    };
    let license = entry
        .license
        .as_ref()
        .and_then(|license| license.spdx.clone().or_else(|| license.path.clone()))
        .unwrap_or_else(|| "-".to_string());
    vec![
        entry.name.clone(),
        source,
        reference,
        entry.short_commit().unwrap_or("-").to_string(),
        license,
    ]
}
