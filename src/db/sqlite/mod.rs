//! SQLite database module

pub mod models;
mod migrations;
mod api_keys;
mod financial;
mod jobs;
mod job_queue;
mod record_store;

pub use job_queue::SqliteJobQueue;
pub use models::ApiKey;
pub use record_store::SqliteRecordStore;

use crate::error::{AppError, Result};
use crate::models::{DerivedFields, FinancialRecord, FinancialRecordInput, NaturalKey, RecordFilter};
use crate::queue::{FailDisposition, IngestionJob, JobState, JobSummary, QueueStats};
use crate::store::UpsertOutcome;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Run `f` against the database on tokio's blocking pool.
///
/// The async adapters go through here so SQLite I/O and lock waits stay off
/// the async worker threads.
pub(crate) async fn blocking<T, F>(db: &Arc<SqliteDb>, f: F) -> Result<T>
where
    F: FnOnce(&SqliteDb) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| AppError::StoreUnavailable(format!("database task failed: {}", e)))?
}

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, used by tests and tooling
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Financial Record Methods ==========

    /// Upsert a record by natural key
    pub fn upsert_record(&self, record: &FinancialRecordInput) -> Result<UpsertOutcome> {
        let conn = self.conn.lock();
        financial::upsert_record(&conn, record).map_err(|e| classify_error(e, true))
    }

    /// Get a filtered page of records
    pub fn find_records(
        &self,
        filter: &RecordFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<FinancialRecord>> {
        let conn = self.conn.lock();
        financial::find_records(&conn, filter, offset, limit).map_err(|e| classify_error(e, false))
    }

    /// Count records matching a filter
    pub fn count_records(&self, filter: &RecordFilter) -> Result<u64> {
        let conn = self.conn.lock();
        financial::count_records(&conn, filter).map_err(|e| classify_error(e, false))
    }

    /// Write derived metrics while the reported figures are unchanged
    pub fn update_derived(&self, record: &FinancialRecord, derived: &DerivedFields) -> Result<bool> {
        let conn = self.conn.lock();
        financial::update_derived(&conn, record, derived).map_err(|e| classify_error(e, true))
    }

    /// Get a record by natural key
    pub fn get_record(&self, key: &NaturalKey) -> Result<Option<FinancialRecord>> {
        let conn = self.conn.lock();
        financial::get_record(&conn, key).map_err(|e| classify_error(e, false))
    }

    // ========== Ingestion Job Methods ==========

    /// Insert a new waiting job
    pub fn insert_job(
        &self,
        id: &str,
        records: &[Value],
        max_attempts: u32,
        backoff_ms: i64,
        run_at_ms: i64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        jobs::insert_job(&conn, id, records, max_attempts, backoff_ms, run_at_ms)
    }

    /// Claim the oldest due job
    pub fn claim_job(&self, now_ms: i64, lease_ms: i64) -> Result<Option<IngestionJob>> {
        let mut conn = self.conn.lock();
        jobs::claim_next(&mut conn, now_ms, lease_ms)
    }

    /// Remove a finished job, if `attempt` still holds the claim
    pub fn complete_job(&self, id: &str, attempt: u32) -> Result<bool> {
        let conn = self.conn.lock();
        jobs::complete_job(&conn, id, attempt)
    }

    /// Record a failed attempt, if `attempt` still holds the claim
    pub fn fail_job(
        &self,
        id: &str,
        attempt: u32,
        error: &str,
        now_ms: i64,
    ) -> Result<Option<FailDisposition>> {
        let mut conn = self.conn.lock();
        jobs::fail_job(&mut conn, id, attempt, error, now_ms)
    }

    /// Look up a stored job
    pub fn get_job(&self, id: &str) -> Result<Option<JobSummary>> {
        let conn = self.conn.lock();
        jobs::get_job(&conn, id)
    }

    /// List jobs in a state
    pub fn list_jobs(&self, state: JobState, limit: u32) -> Result<Vec<JobSummary>> {
        let conn = self.conn.lock();
        jobs::list_jobs(&conn, state, limit)
    }

    /// Re-arm an exhausted job
    pub fn rearm_job(&self, id: &str, now_ms: i64) -> Result<bool> {
        let conn = self.conn.lock();
        jobs::rearm_exhausted(&conn, id, now_ms)
    }

    /// Job counts per state
    pub fn job_stats(&self) -> Result<QueueStats> {
        let conn = self.conn.lock();
        jobs::count_by_state(&conn)
    }

    // ========== API Key Methods ==========

    /// Create a new API key, returning the plaintext once
    pub fn create_api_key(&self, name: &str) -> Result<(i64, String)> {
        let conn = self.conn.lock();
        api_keys::create_api_key(&conn, name)
    }

    /// Store a known API key under a name
    pub fn seed_api_key(&self, name: &str, api_key: &str) -> Result<()> {
        let conn = self.conn.lock();
        api_keys::seed_api_key(&conn, name, api_key)
    }

    /// Validate an API key
    pub fn validate_api_key(&self, api_key: &str) -> Result<ApiKey> {
        let conn = self.conn.lock();
        api_keys::validate_api_key(&conn, api_key)
    }

    /// Check if any API key exists
    pub fn has_api_key(&self) -> Result<bool> {
        let conn = self.conn.lock();
        api_keys::has_api_key(&conn)
    }
}

/// Split SQLite failures into systemic faults and record-level faults.
///
/// Busy, locked, I/O and open failures mean the store itself is unhealthy.
/// Anything else on a write is blamed on the record being written.
fn classify_error(err: rusqlite::Error, is_write: bool) -> AppError {
    let systemic = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::ReadOnly
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::OutOfMemory
                | ErrorCode::FileLockingProtocolFailed
                | ErrorCode::PermissionDenied
        ),
        _ => false,
    };

    if systemic {
        AppError::StoreUnavailable(err.to_string())
    } else if is_write {
        AppError::RecordPersist(err.to_string())
    } else {
        AppError::Database(err)
    }
}
