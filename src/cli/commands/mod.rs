//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

pub mod add;
pub mod completions;
pub mod import;
pub mod init;
pub mod list;
pub mod remove;
pub mod status;
pub mod sync;
pub mod update;
pub mod verify;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Init(args) => init::run(ctx, args),
        Commands::Add(args) => add::run(ctx, args),
        Commands::Sync(args) => sync::run(ctx, args),
        Commands::Update(args) => update::run(ctx, args),
        Commands::Verify(args) => verify::run(ctx, args),
        Commands::Import(args) => import::run(ctx, args),
        Commands::List(args) => list::run(ctx, args),
        Commands::Remove(args) => remove::run(ctx, args),
        Commands::Status(args) => status::run(ctx, args),
        Commands::Completions(args) => completions::run(args),
    }
}
