//! `RecordStore` backed by SQLite

use super::{blocking, SqliteDb};
use crate::error::Result;
use crate::models::{DerivedFields, FinancialRecord, FinancialRecordInput, NaturalKey, RecordFilter};
use crate::store::{RecordStore, UpsertOutcome};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SqliteRecordStore {
    db: Arc<SqliteDb>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert(&self, record: &FinancialRecordInput) -> Result<UpsertOutcome> {
        let record = record.clone();
        blocking(&self.db, move |db| db.upsert_record(&record)).await
    }

    async fn find(
        &self,
        filter: &RecordFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<FinancialRecord>> {
        let filter = filter.clone();
        blocking(&self.db, move |db| db.find_records(&filter, offset, limit)).await
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64> {
        let filter = filter.clone();
        blocking(&self.db, move |db| db.count_records(&filter)).await
    }

    async fn update_derived(
        &self,
        record: &FinancialRecord,
        derived: &DerivedFields,
    ) -> Result<bool> {
        let record = record.clone();
        let derived = *derived;
        blocking(&self.db, move |db| db.update_derived(&record, &derived)).await
    }

    async fn get(&self, key: &NaturalKey) -> Result<Option<FinancialRecord>> {
        let key = key.clone();
        blocking(&self.db, move |db| db.get_record(&key)).await
    }
}
