//! # SQLite Record Store
//!
//! Records live in a single `bmi_records` table. Creation timestamps are
//! stored as fixed-width RFC 3339 text (nine fractional digits, `Z`
//! suffix) so that text comparison in `created_at > ?` orders the same
//! way as time does.
//!
//! SQLite calls are blocking and run on the blocking pool, each inside its
//! own transaction. Every call is bounded by the request deadline:
//!
//! - an expired context never touches the database
//! - lock waits give up at the deadline (busy timeout)
//! - a running statement is interrupted through the progress handler
//! - a transaction commits only if the deadline has not passed and the
//!   caller has not been released; otherwise it rolls back
//!
//! The caller is released at the deadline regardless. Once a commit has
//! started, the caller waits for it instead, so a reported
//! `DeadlineExceeded` always means nothing was written.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::domain::{BmiRecord, DomainError, DomainResult};

use super::cursor;
use super::{RecordStore, StoreFuture};

/// Number of VM instructions between deadline checks
const PROGRESS_OPS: i32 = 1_000;

/// Added to the busy timeout so a lock wait ends after the deadline
const BUSY_SLACK: Duration = Duration::from_millis(5);

// Call states shared by the caller and the blocking task
const CALL_RUNNING: u8 = 0;
const CALL_COMMITTING: u8 = 1;
const CALL_ABANDONED: u8 = 2;

/// Storage format for `created_at`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

// SQLite's `%f` has millisecond precision; pad to the nine digits of
// TIMESTAMP_FORMAT.
const CREATE_SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS bmi_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_name TEXT NOT NULL,
        weight REAL NOT NULL,
        height REAL NOT NULL,
        bmi REAL NOT NULL,
        created_at TEXT NOT NULL
            DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000000Z')
    );
    CREATE INDEX IF NOT EXISTS idx_bmi_records_created_at ON bmi_records (created_at);
";

const FETCH_PAGE_SQL: &str = "SELECT id, user_name, weight, height, bmi, created_at
    FROM bmi_records WHERE created_at > ?1 ORDER BY created_at LIMIT ?2";

const FETCH_BY_NAME_SQL: &str = "SELECT id, user_name, weight, height, bmi, created_at
    FROM bmi_records WHERE user_name = ?1";

const INSERT_SQL: &str = "INSERT INTO bmi_records (user_name, weight, height, bmi, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)";

const DELETE_SQL: &str = "DELETE FROM bmi_records WHERE id = ?1";

/// SQLite-backed record store.
///
/// The connection is owned by the store and shared by clones; SQLite
/// serializes writers at its own transaction boundary.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            DomainError::internal(format!("failed to open {}: {}", path.display(), e))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> DomainResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create the records table and its index if missing
    pub fn migrate(&self) -> DomainResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(())
    }

    /// Verify the connection answers
    pub fn ping(&self) -> DomainResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn lock(&self) -> DomainResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DomainError::internal("connection lock poisoned"))
    }

    /// Run `op` in a transaction on the blocking pool, bounded by the
    /// request deadline
    async fn run<T, F>(
        &self,
        ctx: &RequestContext,
        behavior: TransactionBehavior,
        op: F,
    ) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DomainResult<T> + Send + 'static,
    {
        let remaining = ctx.remaining().ok_or(DomainError::DeadlineExceeded)?;
        let deadline = ctx.deadline();
        let conn = Arc::clone(&self.conn);
        let state = Arc::new(AtomicU8::new(CALL_RUNNING));
        let task_state = Arc::clone(&state);

        let mut task = tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| DomainError::internal("connection lock poisoned"))?;
            run_in_transaction(&mut *conn, behavior, deadline, &task_state, op)
                .map_err(|e| past_deadline_as_timeout(e, deadline))
        });

        match tokio::time::timeout(remaining, &mut task).await {
            Ok(joined) => join_result(joined),
            Err(_) => {
                if state
                    .compare_exchange(
                        CALL_RUNNING,
                        CALL_ABANDONED,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    warn!(request_id = %ctx.request_id, "store call abandoned at deadline");
                    return Err(DomainError::DeadlineExceeded);
                }
                // Commit already under way: its outcome is the call's outcome
                join_result(task.await)
            }
        }
    }
}

/// Body of a store call, run while holding the connection lock.
///
/// Commits only after winning the race against the caller's timeout.
fn run_in_transaction<T, F>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    deadline: Instant,
    state: &AtomicU8,
    op: F,
) -> DomainResult<T>
where
    F: FnOnce(&Connection) -> DomainResult<T>,
{
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
        .ok_or(DomainError::DeadlineExceeded)?;
    if state.load(Ordering::SeqCst) == CALL_ABANDONED {
        return Err(DomainError::DeadlineExceeded);
    }

    conn.busy_timeout(remaining + BUSY_SLACK)?;
    let tx = conn.transaction_with_behavior(behavior)?;

    tx.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
    let outcome = op(&tx);
    tx.progress_handler(0, None::<fn() -> bool>);
    let value = outcome?;

    if Instant::now() >= deadline
        || state
            .compare_exchange(
                CALL_RUNNING,
                CALL_COMMITTING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
    {
        // Dropping `tx` rolls it back
        return Err(DomainError::DeadlineExceeded);
    }

    tx.commit()?;
    Ok(value)
}

/// Failures seen after the deadline (lock waits, interrupts) are timeouts
fn past_deadline_as_timeout(err: DomainError, deadline: Instant) -> DomainError {
    if Instant::now() >= deadline {
        DomainError::DeadlineExceeded
    } else {
        err
    }
}

fn join_result<T>(joined: Result<DomainResult<T>, JoinError>) -> DomainResult<T> {
    joined.map_err(|e| DomainError::internal(format!("store task failed: {}", e)))?
}

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<BmiRecord> {
    let created_at: String = row.get(5)?;
    Ok(BmiRecord {
        id: row.get(0)?,
        user_name: row.get(1)?,
        weight: row.get(2)?,
        height: row.get(3)?,
        bmi: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

fn query_records(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> DomainResult<Vec<BmiRecord>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, row_to_record)?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

fn insert_record(conn: &Connection, record: &BmiRecord) -> DomainResult<(i64, DateTime<Utc>)> {
    let created_at = Utc::now();
    let mut stmt = conn.prepare_cached(INSERT_SQL)?;
    stmt.execute(params![
        record.user_name,
        record.weight,
        record.height,
        record.bmi,
        format_timestamp(&created_at),
    ])?;
    Ok((conn.last_insert_rowid(), created_at))
}

fn delete_record(conn: &Connection, id: i64) -> DomainResult<()> {
    let affected = conn.execute(DELETE_SQL, params![id])?;
    match affected {
        0 => Err(DomainError::NotFound),
        1 => Ok(()),
        n => Err(DomainError::internal(format!(
            "unexpected rows affected deleting id {}: {}",
            id, n
        ))),
    }
}

impl RecordStore for SqliteRecordStore {
    fn fetch<'a>(
        &'a self,
        ctx: &'a RequestContext,
        cursor: &'a str,
        num: u32,
    ) -> StoreFuture<'a, (Vec<BmiRecord>, String)> {
        Box::pin(async move {
            let after = format_timestamp(&cursor::lower_bound(cursor)?);

            let records = self
                .run(ctx, TransactionBehavior::Deferred, move |conn| {
                    query_records(conn, FETCH_PAGE_SQL, params![after, num])
                })
                .await?;

            let next = cursor::next_cursor(
                records.len(),
                num,
                records.last().map(|r| &r.created_at),
            );
            Ok((records, next))
        })
    }

    fn get_by_name<'a>(
        &'a self,
        ctx: &'a RequestContext,
        name: &'a str,
    ) -> StoreFuture<'a, Vec<BmiRecord>> {
        Box::pin(async move {
            let name = name.to_string();
            self.run(ctx, TransactionBehavior::Deferred, move |conn| {
                query_records(conn, FETCH_BY_NAME_SQL, params![name])
            })
            .await
        })
    }

    fn store<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: &'a mut BmiRecord,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let pending = record.clone();
            let (id, created_at) = self
                .run(ctx, TransactionBehavior::Immediate, move |conn| {
                    insert_record(conn, &pending)
                })
                .await?;
            record.id = id;
            record.created_at = created_at;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, ctx: &'a RequestContext, id: i64) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.run(ctx, TransactionBehavior::Immediate, move |conn| {
                delete_record(conn, id)
            })
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    fn ctx() -> RequestContext {
        RequestContext::with_timeout(Duration::from_secs(5))
    }

    async fn seed(store: &SqliteRecordStore, names: &[&str]) -> Vec<BmiRecord> {
        let mut stored = Vec::new();
        for name in names {
            let mut record = BmiRecord::new(*name, 70.0, 1.75);
            record.calculate_bmi();
            store.store(&ctx(), &mut record).await.unwrap();
            stored.push(record);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        stored
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_timestamp(&DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let b = format_timestamp(&DateTime::from_timestamp(1_700_000_000, 120_000_000).unwrap());
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2023-11-14T22:13:20.000000000Z");
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let store = create_test_store();
        store.migrate().unwrap();
        store.ping().unwrap();
    }

    #[tokio::test]
    async fn test_store_assigns_increasing_ids() {
        let store = create_test_store();
        let before = Utc::now();
        let records = seed(&store, &["a", "b", "c"]).await;
        let after = Utc::now();

        assert!(records.iter().all(|r| r.is_stored()));
        assert!(records[0].id < records[1].id);
        assert!(records[1].id < records[2].id);
        assert!(records[0].created_at >= before);
        assert!(records[2].created_at <= after);
    }

    #[tokio::test]
    async fn test_fetch_paginates_with_cursor() {
        let store = create_test_store();
        let seeded = seed(&store, &["a", "b", "c"]).await;

        let (page, next) = store.fetch(&ctx(), "", 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, seeded[0].id);
        assert_eq!(page[1].id, seeded[1].id);
        assert!(!next.is_empty());
        assert_eq!(next, cursor::encode_cursor(&seeded[1].created_at));

        let (page, next) = store.fetch(&ctx(), &next, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, seeded[2].id);
        assert!(next.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_page_larger_than_table() {
        let store = create_test_store();
        seed(&store, &["a", "b"]).await;

        let (page, next) = store.fetch(&ctx(), "", 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(next.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_empty_table() {
        let store = create_test_store();
        let (page, next) = store.fetch(&ctx(), "", 10).await.unwrap();
        assert!(page.is_empty());
        assert!(next.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_bad_cursor() {
        let store = create_test_store();
        let result = store.fetch(&ctx(), "garbage-token", 10).await;
        assert_eq!(result, Err(DomainError::BadParamInput));
    }

    #[tokio::test]
    async fn test_round_trips_stored_values() {
        let store = create_test_store();
        let seeded = seed(&store, &["zoe"]).await;

        let found = store.get_by_name(&ctx(), "zoe").await.unwrap();
        assert_eq!(found, seeded);
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let store = create_test_store();
        seed(&store, &["amy", "ben", "amy"]).await;

        let found = store.get_by_name(&ctx(), "amy").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.user_name == "amy"));

        let none = store.get_by_name(&ctx(), "nobody").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store();
        let seeded = seed(&store, &["gus"]).await;
        let id = seeded[0].id;

        store.delete(&ctx(), id).await.unwrap();
        assert!(store.get_by_name(&ctx(), "gus").await.unwrap().is_empty());

        let again = store.delete(&ctx(), id).await;
        assert_eq!(again, Err(DomainError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let store = create_test_store();
        assert_eq!(store.delete(&ctx(), 9_999).await, Err(DomainError::NotFound));
    }

    #[tokio::test]
    async fn test_expired_context_never_writes() {
        let store = create_test_store();
        let expired = RequestContext::with_timeout(Duration::ZERO);

        let mut record = BmiRecord::new("late", 70.0, 1.75);
        let result = store.store(&expired, &mut record).await;
        assert_eq!(result, Err(DomainError::DeadlineExceeded));
        assert!(!record.is_stored());

        let (page, _) = store.fetch(&ctx(), "", 10).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_running_query_is_interrupted_at_deadline() {
        let store = create_test_store();
        let short = RequestContext::with_timeout(Duration::from_millis(50));

        let result = store
            .run(&short, TransactionBehavior::Deferred, |conn| {
                conn.query_row(
                    "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c)
                     SELECT count(*) FROM c",
                    [],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(DomainError::from)
            })
            .await;
        assert_eq!(result, Err(DomainError::DeadlineExceeded));

        // The connection is usable again once the statement is interrupted
        let (page, _) = store.fetch(&ctx(), "", 10).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_write_finishing_after_deadline_is_rolled_back() {
        let store = create_test_store();
        let short = RequestContext::with_timeout(Duration::from_millis(50));
        let pending = BmiRecord::new("slow", 70.0, 1.75);

        let result = store
            .run(&short, TransactionBehavior::Immediate, move |conn| {
                let inserted = insert_record(conn, &pending)?;
                std::thread::sleep(Duration::from_millis(150));
                Ok(inserted)
            })
            .await;
        assert_eq!(result, Err(DomainError::DeadlineExceeded));

        // Queues behind the abandoned call on the connection lock
        assert!(store.get_by_name(&ctx(), "slow").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_blocked_by_other_writer_never_lands() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bmi.db");
        let store = SqliteRecordStore::open(&path).unwrap();
        store.migrate().unwrap();

        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE").unwrap();

        let short = RequestContext::with_timeout(Duration::from_millis(200));
        let mut record = BmiRecord::new("late", 70.0, 1.75);
        let result = store.store(&short, &mut record).await;
        assert_eq!(result, Err(DomainError::DeadlineExceeded));
        assert!(!record.is_stored());

        other.execute_batch("COMMIT").unwrap();

        assert!(store.get_by_name(&ctx(), "late").await.unwrap().is_empty());
        let count: i64 = other
            .query_row("SELECT count(*) FROM bmi_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        // The store writes normally once the lock is free
        let mut record = BmiRecord::new("late", 70.0, 1.75);
        store.store(&ctx(), &mut record).await.unwrap();
        assert!(record.is_stored());
    }

    #[test]
    fn test_delete_matching_many_rows_is_internal() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE bmi_records (id INTEGER, user_name TEXT);
             INSERT INTO bmi_records VALUES (1, 'a'), (1, 'b');",
        )
        .unwrap();

        assert!(matches!(delete_record(&conn, 1), Err(DomainError::Internal(_))));
    }

    #[tokio::test]
    async fn test_column_default_orders_with_stored_timestamps() {
        let store = create_test_store();
        let seeded = seed(&store, &["app"]).await;

        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO bmi_records (user_name, weight, height, bmi) VALUES ('raw', 1, 1, 1)",
                [],
            )
            .unwrap();
        let text: String = store
            .lock()
            .unwrap()
            .query_row(
                "SELECT created_at FROM bmi_records WHERE user_name = 'raw'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(text.len(), format_timestamp(&seeded[0].created_at).len());

        let (page, _) = store.fetch(&ctx(), "", 10).await.unwrap();
        let names: Vec<_> = page.iter().map(|r| r.user_name.as_str()).collect();
        assert_eq!(names, vec!["app", "raw"]);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bmi.db");

        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store.migrate().unwrap();
            seed(&store, &["ida"]).await;
        }

        let reopened = SqliteRecordStore::open(&path).unwrap();
        let found = reopened.get_by_name(&ctx(), "ida").await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
