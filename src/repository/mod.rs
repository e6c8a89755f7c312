//! # Record Repository
//!
//! Persistence contract for BMI records and its SQLite implementation.
//!
//! Listing is cursor-paginated: a page holds up to `num` records created
//! strictly after the cursor's timestamp, ascending by creation time. A
//! full page yields the cursor of its last record; a short page yields an
//! empty cursor, which marks the end.

pub mod cursor;
mod sqlite;

use std::future::Future;
use std::pin::Pin;

use crate::context::RequestContext;
use crate::domain::{BmiRecord, DomainResult};

pub use cursor::{decode_cursor, encode_cursor};
pub use sqlite::SqliteRecordStore;

/// Boxed future returned by store and service operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = DomainResult<T>> + Send + 'a>>;

/// Storage backend for BMI records
pub trait RecordStore: Send + Sync {
    /// Fetch up to `num` records created after `cursor`.
    ///
    /// Returns the page and the cursor of the next page (empty if none).
    fn fetch<'a>(
        &'a self,
        ctx: &'a RequestContext,
        cursor: &'a str,
        num: u32,
    ) -> StoreFuture<'a, (Vec<BmiRecord>, String)>;

    /// All records whose user name matches exactly
    fn get_by_name<'a>(
        &'a self,
        ctx: &'a RequestContext,
        name: &'a str,
    ) -> StoreFuture<'a, Vec<BmiRecord>>;

    /// Persist a record, writing the assigned id and creation time back onto it
    fn store<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: &'a mut BmiRecord,
    ) -> StoreFuture<'a, ()>;

    /// Delete exactly one record by id
    fn delete<'a>(&'a self, ctx: &'a RequestContext, id: i64) -> StoreFuture<'a, ()>;
}
