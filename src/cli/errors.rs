//! CLI-specific error types
//!
//! All CLI errors are fatal: `main` prints them and exits non-zero.

use thiserror::Error;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file or environment error
    #[error("BMI_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// Startup failed (database, runtime, listener)
    #[error("BMI_CLI_BOOT_FAILED: {0}")]
    Boot(String),
}

impl CliError {
    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::Boot(msg.into())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
