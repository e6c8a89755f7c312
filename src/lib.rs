//! bmi-records - a small BMI record service
//!
//! Records are stored in SQLite and listed through an opaque timestamp
//! cursor; see [`repository::cursor`].

pub mod cli;
pub mod context;
pub mod domain;
pub mod http_server;
pub mod observability;
pub mod repository;
pub mod service;

pub use context::RequestContext;
pub use domain::{BmiRecord, CreateRecordRequest, DomainError, DomainResult};
pub use repository::{RecordStore, SqliteRecordStore};
pub use service::{BmiService, RecordService};
