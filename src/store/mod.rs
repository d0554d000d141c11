//! Record store adapter
//!
//! The persistent store is reached only through [`RecordStore`]; the SQLite
//! implementation lives in `db::sqlite`.

use crate::error::Result;
use crate::models::{DerivedFields, FinancialRecord, FinancialRecordInput, NaturalKey, RecordFilter};
use async_trait::async_trait;
use serde::Serialize;

/// Effect of an upsert on the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// An identical record already existed
    Unchanged,
}

/// Persistent store of financial records keyed by natural key
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert the record or overwrite the one sharing its natural key.
    ///
    /// Systemic faults come back as `AppError::StoreUnavailable`; a fault
    /// caused by this record's data comes back as `AppError::RecordPersist`.
    async fn upsert(&self, record: &FinancialRecordInput) -> Result<UpsertOutcome>;

    /// Records matching `filter`, in insertion order
    async fn find(
        &self,
        filter: &RecordFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<FinancialRecord>>;

    /// Number of records matching `filter`
    async fn count(&self, filter: &RecordFilter) -> Result<u64>;

    /// Write `derived` onto the stored copy of `record` without touching its
    /// reported figures.
    ///
    /// Skipped when the stored figures no longer match `record`, so a newer
    /// ingestion is never reverted. Returns whether the row changed.
    async fn update_derived(
        &self,
        record: &FinancialRecord,
        derived: &DerivedFields,
    ) -> Result<bool>;

    /// Look up a single record by natural key
    async fn get(&self, key: &NaturalKey) -> Result<Option<FinancialRecord>>;
}
