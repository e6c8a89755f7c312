//! CLI command implementations
//!
//! Boot sequence for `serve`: environment, configuration, logging, store
//! (open, migrate, ping), then the HTTP server on a tokio runtime.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::http_server::{HttpServer, RecordState};
use crate::observability;
use crate::repository::SqliteRecordStore;
use crate::service::BmiService;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve { config } => serve(config.as_deref()),
        Command::Migrate { config } => migrate(config.as_deref()),
    }
}

/// Load `.env` from the working directory if there is one
fn load_dotenv() {
    if let Err(e) = dotenv::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "failed to load .env file");
        }
    }
}

fn boot(config_path: Option<&Path>) -> CliResult<Config> {
    load_dotenv();
    let config = Config::load(config_path)?;
    observability::init_logging(&config.log_level);
    Ok(config)
}

/// Open the configured database and make sure the schema exists
pub fn open_store(config: &Config) -> CliResult<SqliteRecordStore> {
    let store = SqliteRecordStore::open(config.database_path())
        .map_err(|e| CliError::boot_failed(format!("failed to open database: {}", e)))?;
    store
        .migrate()
        .map_err(|e| CliError::boot_failed(format!("failed to create table: {}", e)))?;
    store
        .ping()
        .map_err(|e| CliError::boot_failed(format!("failed to ping database: {}", e)))?;
    Ok(store)
}

/// Start the HTTP server
pub fn serve(config_path: Option<&Path>) -> CliResult<()> {
    let config = boot(config_path)?;
    let store = open_store(&config)?;
    info!(
        database = %config.database_path,
        timeout_secs = config.context_timeout_secs,
        "database ready"
    );

    let service = BmiService::new(Arc::new(store));
    let state = RecordState::new(Arc::new(service), config.context_timeout());
    let server = HttpServer::with_config(config.server.clone(), state);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Create the schema and exit
pub fn migrate(config_path: Option<&Path>) -> CliResult<()> {
    let config = boot(config_path)?;
    open_store(&config)?;
    info!(database = %config.database_path, "schema ready");
    Ok(())
}
