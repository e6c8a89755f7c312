//! Cursor Pagination Tests
//!
//! Walks a file-backed store page by page:
//! - a full page yields a cursor, a short page yields an empty one
//! - following cursors visits every record exactly once, in creation order
//! - malformed cursors are rejected as bad input

use std::time::Duration;

use bmi_records::repository::{decode_cursor, encode_cursor};
use bmi_records::{BmiRecord, DomainError, RecordStore, RequestContext, SqliteRecordStore};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn ctx() -> RequestContext {
    RequestContext::with_timeout(Duration::from_secs(5))
}

fn create_store(dir: &TempDir) -> SqliteRecordStore {
    let store = SqliteRecordStore::open(dir.path().join("bmi.db")).unwrap();
    store.migrate().unwrap();
    store
}

async fn seed(store: &SqliteRecordStore, count: usize) -> Vec<BmiRecord> {
    let mut stored = Vec::with_capacity(count);
    for i in 0..count {
        let mut record = BmiRecord::new(format!("user {}", i), 50.0 + i as f64, 1.75);
        record.calculate_bmi();
        store.store(&ctx(), &mut record).await.unwrap();
        stored.push(record);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    stored
}

// =============================================================================
// Page Boundaries
// =============================================================================

/// Two-record pages over three records: one full page, then the remainder.
#[tokio::test]
async fn test_two_pages_over_three_records() {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    let seeded = seed(&store, 3).await;

    let (first, cursor) = store.fetch(&ctx(), "", 2).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(!cursor.is_empty(), "full page must carry a cursor");
    assert_eq!(decode_cursor(&cursor).unwrap(), seeded[1].created_at);

    let (second, cursor) = store.fetch(&ctx(), &cursor, 2).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, seeded[2].id);
    assert!(cursor.is_empty(), "short page ends pagination");
}

/// Exactly divisible pages end with one empty page.
#[tokio::test]
async fn test_exact_multiple_ends_with_empty_page() {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    seed(&store, 4).await;

    let (_, cursor) = store.fetch(&ctx(), "", 2).await.unwrap();
    let (page, cursor) = store.fetch(&ctx(), &cursor, 2).await.unwrap();
    assert_eq!(page.len(), 2);
    assert!(!cursor.is_empty());

    let (page, cursor) = store.fetch(&ctx(), &cursor, 2).await.unwrap();
    assert!(page.is_empty());
    assert!(cursor.is_empty());
}

/// Following cursors visits every record once, ascending by creation time.
#[tokio::test]
async fn test_walk_visits_every_record_once() {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    let seeded = seed(&store, 7).await;

    let mut visited = Vec::new();
    let mut cursor = String::new();
    loop {
        let (page, next) = store.fetch(&ctx(), &cursor, 3).await.unwrap();
        visited.extend(page.into_iter().map(|r| r.id));
        if next.is_empty() {
            break;
        }
        cursor = next;
    }

    let expected: Vec<i64> = seeded.iter().map(|r| r.id).collect();
    assert_eq!(visited, expected);
}

/// A cursor taken from any record starts strictly after it.
#[tokio::test]
async fn test_cursor_is_exclusive_lower_bound() {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    let seeded = seed(&store, 3).await;

    let cursor = encode_cursor(&seeded[0].created_at);
    let (page, next) = store.fetch(&ctx(), &cursor, 10).await.unwrap();
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![seeded[1].id, seeded[2].id]);
    assert!(next.is_empty());
}

// =============================================================================
// Bad Input
// =============================================================================

/// Garbage cursors fail the fetch with bad input.
#[tokio::test]
async fn test_garbage_cursor_is_bad_input() {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    seed(&store, 1).await;

    let result = store.fetch(&ctx(), "garbage-token", 2).await;
    assert_eq!(result, Err(DomainError::BadParamInput));
}
