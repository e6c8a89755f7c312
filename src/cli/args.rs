//! CLI argument definitions using clap
//!
//! Commands:
//! - bmi-records serve [--config <path>]
//! - bmi-records migrate [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BMI record service
#[derive(Parser, Debug)]
#[command(name = "bmi-records")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create the database schema and exit
    Migrate {
        /// Path to a JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
