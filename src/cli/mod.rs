//! CLI module
//!
//! Provides command-line interface for:
//! - serve: Open the database and run the HTTP server
//! - migrate: Create the database schema and exit

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{migrate, open_store, run_command, serve};
pub use config::Config;
pub use errors::{CliError, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}
