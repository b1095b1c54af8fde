//! Command-line surface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, completions::CompletionsArgs, import::ImportArgs, init::InitArgs,
    list::ListArgs, remove::RemoveArgs, status::StatusArgs, sync::SyncArgs, update::UpdateArgs,
    verify::VerifyArgs,
};

#[derive(Parser, Debug)]
#[command(name = "skv", version, about = "Vendor agent skills into a repository")]
pub struct Cli {
    /// Suppress progress output and logs
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub robot: bool,

    /// Use this config file instead of the global and project ones
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create skv.toml, skv.lock and the vendor directory
    Init(InitArgs),
    /// Add a skill from a repository and vendor it
    Add(AddArgs),
    /// Bring vendored skills in line with the manifest
    Sync(SyncArgs),
    /// Fetch the latest commit for remote skills
    Update(UpdateArgs),
    /// Check vendored skills against the lock file
    Verify(VerifyArgs),
    /// Adopt an existing tool-local skill directory
    Import(ImportArgs),
    /// Show locked skills
    List(ListArgs),
    /// Remove a skill, its vendored copy and its links
    Remove(RemoveArgs),
    /// Compare vendored skills with the lock file
    Status(StatusArgs),
    /// Print a shell completion script
    Completions(CompletionsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["skv", "status", "--robot", "-vv"]).unwrap();
        assert!(cli.robot);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn add_parses_repo_and_flags() {
        let cli = Cli::try_parse_from([
            "skv",
            "add",
            "https://github.com/acme/skills#v1:tools/lint",
            "--name",
            "lint",
            "--no-sync",
        ])
        .unwrap();
        let Commands::Add(args) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(args.repo, "https://github.com/acme/skills#v1:tools/lint");
        assert_eq!(args.name.as_deref(), Some("lint"));
        assert!(args.no_sync);
        assert!(!args.force);
    }
}
