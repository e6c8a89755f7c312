//! # HTTP Server Module
//!
//! Axum server exposing the record API.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/records` - Lookup by user name, store
//! - `/records-page` - Cursor-paginated listing
//! - `/records/:id` - Delete

pub mod config;
pub mod errors;
pub mod observability_routes;
pub mod record_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult};
pub use record_routes::{RecordState, CURSOR_HEADER, DEFAULT_PAGE_SIZE};
pub use server::HttpServer;
