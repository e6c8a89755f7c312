//! # Record Service
//!
//! Orchestration between the HTTP layer and the store. Every operation is
//! delegated to the store as is; errors pass through unchanged.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::domain::BmiRecord;
use crate::repository::{RecordStore, StoreFuture};

/// Operations exposed to the HTTP layer
pub trait RecordService: Send + Sync {
    fn fetch<'a>(
        &'a self,
        ctx: &'a RequestContext,
        cursor: &'a str,
        num: u32,
    ) -> StoreFuture<'a, (Vec<BmiRecord>, String)>;

    fn get_by_name<'a>(
        &'a self,
        ctx: &'a RequestContext,
        name: &'a str,
    ) -> StoreFuture<'a, Vec<BmiRecord>>;

    fn store<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: &'a mut BmiRecord,
    ) -> StoreFuture<'a, ()>;

    fn delete<'a>(&'a self, ctx: &'a RequestContext, id: i64) -> StoreFuture<'a, ()>;
}

/// Service backed by a [`RecordStore`]
pub struct BmiService<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> BmiService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: RecordStore> RecordService for BmiService<S> {
    fn fetch<'a>(
        &'a self,
        ctx: &'a RequestContext,
        cursor: &'a str,
        num: u32,
    ) -> StoreFuture<'a, (Vec<BmiRecord>, String)> {
        self.store.fetch(ctx, cursor, num)
    }

    fn get_by_name<'a>(
        &'a self,
        ctx: &'a RequestContext,
        name: &'a str,
    ) -> StoreFuture<'a, Vec<BmiRecord>> {
        self.store.get_by_name(ctx, name)
    }

    fn store<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: &'a mut BmiRecord,
    ) -> StoreFuture<'a, ()> {
        self.store.store(ctx, record)
    }

    fn delete<'a>(&'a self, ctx: &'a RequestContext, id: i64) -> StoreFuture<'a, ()> {
        self.store.delete(ctx, id)
    }
}
