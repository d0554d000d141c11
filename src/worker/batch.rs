//! Applies one ingestion job to the record store

use crate::error::{AppError, Result};
use crate::models::FinancialRecordInput;
use crate::queue::{IngestionJob, JobOutcome};
use crate::store::{RecordStore, UpsertOutcome};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Processes the records of a job one by one with per-record isolation
pub struct BatchWorker {
    store: Arc<dyn RecordStore>,
}

impl BatchWorker {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Upsert every record of the job, in batch order.
    ///
    /// A record that fails validation or is rejected by the store is
    /// counted and skipped. A systemic store fault aborts the whole job with
    /// `JobProcessing` so the queue can retry it; records already applied
    /// are safe to apply again.
    pub async fn process(&self, job: &IngestionJob) -> Result<JobOutcome> {
        let mut outcome = JobOutcome::default();
        let mut unchanged = 0usize;

        for (index, raw) in job.records.iter().enumerate() {
            let record = match FinancialRecordInput::from_raw(raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(job_id = %job.id, index, error = %e, "Rejected malformed record");
                    outcome.failed_count += 1;
                    continue;
                }
            };

            match self.store.upsert(&record).await {
                Ok(result) => {
                    if result == UpsertOutcome::Unchanged {
                        unchanged += 1;
                    }
                    outcome.success_count += 1;
                }
                Err(e) if e.is_systemic() => {
                    return Err(AppError::JobProcessing(format!(
                        "record {} of job {}: {}",
                        index, job.id, e
                    )));
                }
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        index,
                        company_id = %record.company_id,
                        reporting_period = %record.reporting_period,
                        error = %e,
                        "Failed to persist record"
                    );
                    outcome.failed_count += 1;
                }
            }
        }

        if unchanged > 0 {
            debug!(job_id = %job.id, unchanged, "Records already up to date");
        }
        info!(
            job_id = %job.id,
            attempt = job.attempts_made,
            success_count = outcome.success_count,
            failed_count = outcome.failed_count,
            "Batch applied"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{SqliteDb, SqliteRecordStore};
    use crate::models::{DerivedFields, FinancialRecord, NaturalKey, RecordFilter};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw(company_id: &str) -> Value {
        json!({
            "company_id": company_id,
            "company_name": "TechCorp",
            "reporting_period": "2023-Q4",
            "industry_sector": "Technology",
            "total_assets": 5000000,
            "total_liabilities": 2000000,
            "revenue": 1500000,
            "net_profit": 300000,
            "cash_flow": 500000,
            "interest_coverage_ratio": 3.5
        })
    }

    fn job(records: Vec<Value>) -> IngestionJob {
        IngestionJob {
            id: "job-1".to_string(),
            records,
            attempts_made: 1,
            max_attempts: 5,
        }
    }

    fn sqlite_store() -> Arc<SqliteRecordStore> {
        Arc::new(SqliteRecordStore::new(Arc::new(SqliteDb::open_in_memory().unwrap())))
    }

    /// Store that goes down after a number of successful upserts
    struct FlakyStore {
        healthy_upserts: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn upsert(&self, _record: &FinancialRecordInput) -> Result<UpsertOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.healthy_upserts {
                Ok(UpsertOutcome::Inserted)
            } else {
                Err(AppError::StoreUnavailable("connection refused".into()))
            }
        }

        async fn find(
            &self,
            _filter: &RecordFilter,
            _offset: u64,
            _limit: u64,
        ) -> Result<Vec<FinancialRecord>> {
            Ok(Vec::new())
        }

        async fn count(&self, _filter: &RecordFilter) -> Result<u64> {
            Ok(0)
        }

        async fn update_derived(
            &self,
            _record: &FinancialRecord,
            _derived: &DerivedFields,
        ) -> Result<bool> {
            Ok(false)
        }

        async fn get(&self, _key: &NaturalKey) -> Result<Option<FinancialRecord>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_malformed_record_is_isolated() {
        let store = sqlite_store();
        let worker = BatchWorker::new(store.clone());

        let mut records: Vec<Value> = (0..4).map(|i| raw(&format!("C{}", i))).collect();
        let mut broken = raw("C9");
        broken["revenue"] = Value::Null;
        records.insert(2, broken);

        let outcome = worker.process(&job(records)).await.unwrap();
        assert_eq!(outcome, JobOutcome { success_count: 4, failed_count: 1 });
        assert_eq!(store.count(&RecordFilter::default()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_non_object_entries_are_tallied() {
        let worker = BatchWorker::new(sqlite_store());
        let records = vec![raw("C1"), json!("not a record"), json!(42)];

        let outcome = worker.process(&job(records)).await.unwrap();
        assert_eq!(outcome, JobOutcome { success_count: 1, failed_count: 2 });
    }

    #[tokio::test]
    async fn test_reprocessing_is_idempotent() {
        let store = sqlite_store();
        let worker = BatchWorker::new(store.clone());
        let job = job(vec![raw("C1"), raw("C2")]);

        worker.process(&job).await.unwrap();
        let key = NaturalKey {
            company_id: "C1".into(),
            reporting_period: "2023-Q4".into(),
            industry_sector: "Technology".into(),
        };
        let first = store.get(&key).await.unwrap().unwrap();

        let outcome = worker.process(&job).await.unwrap();
        assert_eq!(outcome.success_count, 2);
        assert_eq!(store.get(&key).await.unwrap().unwrap(), first);
        assert_eq!(store.count(&RecordFilter::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_systemic_fault_fails_the_job() {
        let worker = BatchWorker::new(Arc::new(FlakyStore {
            healthy_upserts: 1,
            calls: AtomicUsize::new(0),
        }));

        let err = worker
            .process(&job(vec![raw("C1"), raw("C2"), raw("C3")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::JobProcessing(_)));
    }
}
