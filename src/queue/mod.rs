//! Durable ingestion queue
//!
//! Upload requests only validate and enqueue; workers claim jobs later and
//! apply them to the record store. Delivery is at-least-once: a job whose
//! worker dies mid-flight is redelivered once its lease expires.

pub mod job;

pub use job::{
    FailDisposition, IngestionJob, JobHandle, JobOptions, JobOutcome, JobState, JobSummary,
    NewJob, QueueStats,
};

use crate::config::QueueConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// Backend holding queued jobs
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Make the client ready to serve requests
    async fn connect(&self) -> Result<()>;

    /// Stop serving; further calls fail with `QueueUnavailable`
    async fn disconnect(&self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Durably store a new job
    async fn push(&self, job: NewJob) -> Result<JobHandle>;

    /// Claim the next due job, leasing it for `lease`
    async fn claim(&self, lease: Duration) -> Result<Option<IngestionJob>>;

    /// Acknowledge success; the job is removed from the backlog.
    ///
    /// Returns false when `job` is no longer the live claim, e.g. its lease
    /// expired and the job was redelivered.
    async fn complete(&self, job: &IngestionJob) -> Result<bool>;

    /// Record a failed attempt and either re-arm or exhaust the job
    async fn fail(&self, job: &IngestionJob, error: &str) -> Result<FailDisposition>;

    async fn get(&self, job_id: &str) -> Result<Option<JobSummary>>;

    /// Exhausted jobs, oldest first
    async fn exhausted(&self, limit: u32) -> Result<Vec<JobSummary>>;

    /// Re-arm an exhausted job with a fresh attempt budget
    async fn retry(&self, job_id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<QueueStats>;
}

/// Validating front of the queue used by the upload path and the workers
pub struct IngestionQueue {
    client: Arc<dyn QueueClient>,
    options: JobOptions,
    max_batch_size: usize,
    notify: Arc<Notify>,
}

impl IngestionQueue {
    pub fn new(client: Arc<dyn QueueClient>, config: &QueueConfig) -> Self {
        Self {
            client,
            options: JobOptions {
                max_attempts: config.max_attempts,
                backoff: config.backoff,
            },
            max_batch_size: config.max_batch_size,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn client(&self) -> &Arc<dyn QueueClient> {
        &self.client
    }

    /// Signalled whenever a job is enqueued or re-armed
    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Validate a raw batch and enqueue it as one job.
    ///
    /// Anything other than a JSON array of 1 to `max_batch_size` entries is
    /// rejected with `Validation` before touching the backend.
    pub async fn enqueue(&self, batch: &Value) -> Result<JobHandle> {
        let records = self.validate_batch(batch)?;

        let handle = self
            .client
            .push(NewJob {
                records,
                options: self.options,
            })
            .await?;

        info!(
            job_id = %handle.job_id,
            records = handle.record_count,
            "Ingestion batch enqueued"
        );
        self.notify.notify_one();
        Ok(handle)
    }

    /// Re-arm an exhausted job
    pub async fn retry(&self, job_id: &str) -> Result<()> {
        if !self.client.retry(job_id).await? {
            return Err(AppError::NotFound(format!("No exhausted job with id {}", job_id)));
        }
        info!(job_id = %job_id, "Exhausted job re-armed by operator");
        self.notify.notify_one();
        Ok(())
    }

    fn validate_batch(&self, batch: &Value) -> Result<Vec<Value>> {
        let records = batch.as_array().ok_or_else(|| {
            AppError::Validation("Invalid data format. Expected an array.".to_string())
        })?;

        if records.is_empty() {
            return Err(AppError::Validation("Batch must contain at least one record.".to_string()));
        }

        if records.len() > self.max_batch_size {
            return Err(AppError::Validation(format!(
                "Batch size exceeds the limit of {} records.",
                self.max_batch_size
            )));
        }

        Ok(records.clone())
    }
}
