//! # Domain Module
//!
//! The BMI record entity and the error kinds shared by every layer.

mod errors;
mod record;

pub use errors::{DomainError, DomainResult};
pub use record::{BmiRecord, CreateRecordRequest};
