//! The `resumebot` command-line tool: build the index offline, ask a single
//! question, or serve the chat API.

pub mod args;
pub mod commands;
pub mod server;

use anyhow::Result;

pub use args::{Cli, Command};
pub use server::router;

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Build(args) => commands::build(&cli.common, args).await,
        Command::Ask(args) => commands::ask(&cli.common, args).await,
        Command::Serve(args) => commands::serve(&cli.common, args).await,
    }
}
