//! Ingestion Service
//!
//! Accepts uploaded batches and exposes the operator view of the queue.
//! Acceptance only means the batch was durably queued; workers persist it
//! later.

use crate::error::{AppError, Result};
use crate::queue::{IngestionQueue, JobSummary, QueueClient, QueueStats};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Acknowledgement returned for an accepted batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub message: String,
    pub job_id: String,
    pub record_count: usize,
}

/// Ingestion service for the upload path
pub struct IngestionService {
    queue: Arc<IngestionQueue>,
}

impl IngestionService {
    pub fn new(queue: Arc<IngestionQueue>) -> Self {
        Self { queue }
    }

    /// Parse a request body and enqueue it as one batch
    pub async fn upload(&self, body: &[u8]) -> Result<UploadReceipt> {
        let batch: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Malformed JSON payload: {}", e)))?;

        let handle = self.queue.enqueue(&batch).await?;

        Ok(UploadReceipt {
            message: "Data enqueued successfully".to_string(),
            job_id: handle.job_id,
            record_count: handle.record_count,
        })
    }

    /// Look up a job that has not completed yet
    pub async fn job_status(&self, job_id: &str) -> Result<JobSummary> {
        self.queue
            .client()
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    pub async fn exhausted_jobs(&self, limit: u32) -> Result<Vec<JobSummary>> {
        self.queue.client().exhausted(limit).await
    }

    /// Give an exhausted job a fresh attempt budget
    pub async fn retry_job(&self, job_id: &str) -> Result<JobSummary> {
        self.queue.retry(job_id).await?;
        self.job_status(job_id).await
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        self.queue.client().stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::db::sqlite::{SqliteDb, SqliteJobQueue};
    use crate::queue::JobState;
    use std::time::Duration;

    async fn service() -> (Arc<SqliteJobQueue>, IngestionService) {
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        let client = Arc::new(SqliteJobQueue::new(db));
        client.connect().await.unwrap();

        let config = QueueConfig {
            max_attempts: 1,
            backoff: Duration::ZERO,
            ..QueueConfig::default()
        };
        let queue = Arc::new(IngestionQueue::new(client.clone(), &config));
        (client, IngestionService::new(queue))
    }

    #[tokio::test]
    async fn test_upload_returns_job_handle() {
        let (_, service) = service().await;
        let receipt = service
            .upload(br#"[{"company_id": "C1"}, {"company_id": "C2"}]"#)
            .await
            .unwrap();

        assert_eq!(receipt.message, "Data enqueued successfully");
        assert_eq!(receipt.record_count, 2);

        let job = service.job_status(&receipt.job_id).await.unwrap();
        assert_eq!(job.state, JobState::Waiting);
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let (_, service) = service().await;
        let err = service.upload(b"[{\"company_id\": ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(service.queue_stats().await.unwrap(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_retry_exhausted_job() {
        let (client, service) = service().await;
        let receipt = service.upload(br#"[{"company_id": "C1"}]"#).await.unwrap();

        let job = client.claim(Duration::from_secs(30)).await.unwrap().unwrap();
        client.fail(&job, "store down").await.unwrap();
        assert_eq!(service.exhausted_jobs(10).await.unwrap().len(), 1);

        let summary = service.retry_job(&receipt.job_id).await.unwrap();
        assert_eq!(summary.state, JobState::Waiting);
        assert_eq!(summary.attempts_made, 0);
        assert!(service.exhausted_jobs(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (_, service) = service().await;
        assert!(matches!(
            service.job_status("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
