//! Service configuration
//!
//! Resolved in three layers: built-in defaults, an optional JSON file,
//! then environment variables (a `.env` file is honored when present):
//!
//! - `SERVER_ADDRESS` - `host:port` or `:port`
//! - `CONTEXT_TIMEOUT` - per-request deadline in seconds
//! - `DATABASE_PATH` - SQLite database file
//! - `LOG_LEVEL` - default log filter

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::http_server::HttpServerConfig;

use super::errors::{CliError, CliResult};

/// Upper bound for the per-request deadline (one day)
const MAX_CONTEXT_TIMEOUT_SECS: u64 = 86_400;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: HttpServerConfig,

    /// SQLite database file (default "./bmi.db")
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Per-request deadline in seconds (default 30)
    #[serde(default = "default_context_timeout_secs")]
    pub context_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is unset (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database_path() -> String {
    "./bmi.db".to_string()
}

fn default_context_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            database_path: default_database_path(),
            context_timeout_secs: default_context_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file, then the environment
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))
    }

    /// Override fields from environment variables
    pub fn apply_env<F>(&mut self, lookup: F) -> CliResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("SERVER_ADDRESS").filter(|s| !s.is_empty()) {
            self.server
                .set_address(&address)
                .map_err(CliError::config_error)?;
        }

        if let Some(timeout) = lookup("CONTEXT_TIMEOUT") {
            match timeout.trim().parse::<u64>() {
                Ok(secs) => self.context_timeout_secs = secs,
                Err(_) => warn!(
                    value = %timeout,
                    default = default_context_timeout_secs(),
                    "failed to parse CONTEXT_TIMEOUT, using default timeout"
                ),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|s| !s.is_empty()) {
            self.database_path = path;
        }

        if let Some(level) = lookup("LOG_LEVEL").filter(|s| !s.is_empty()) {
            self.log_level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> CliResult<()> {
        if self.context_timeout_secs == 0 {
            return Err(CliError::config_error("context_timeout_secs must be > 0"));
        }

        if self.context_timeout_secs > MAX_CONTEXT_TIMEOUT_SECS {
            return Err(CliError::config_error(format!(
                "context_timeout_secs must be <= {}",
                MAX_CONTEXT_TIMEOUT_SECS
            )));
        }

        if self.database_path.trim().is_empty() {
            return Err(CliError::config_error("database_path must not be empty"));
        }

        Ok(())
    }

    /// Per-request deadline
    pub fn context_timeout(&self) -> Duration {
        Duration::from_secs(self.context_timeout_secs)
    }

    /// Get database path as Path
    pub fn database_path(&self) -> &Path {
        Path::new(&self.database_path)
    }
}
