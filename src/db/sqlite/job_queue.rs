//! `QueueClient` backed by the `ingestion_jobs` table

use super::{blocking, SqliteDb};
use crate::error::{AppError, Result};
use crate::queue::{
    FailDisposition, IngestionJob, JobHandle, JobState, JobSummary, NewJob, QueueClient, QueueStats,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Durable job queue. Starts disconnected; call `connect` before use.
pub struct SqliteJobQueue {
    db: Arc<SqliteDb>,
    ready: AtomicBool,
}

impl SqliteJobQueue {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self {
            db,
            ready: AtomicBool::new(false),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AppError::QueueUnavailable("queue client is not connected".to_string()))
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl QueueClient for SqliteJobQueue {
    async fn connect(&self) -> Result<()> {
        // Fails fast if the backlog table is unreadable
        let stats = blocking(&self.db, |db| db.job_stats()).await?;
        self.ready.store(true, Ordering::Release);
        tracing::info!(
            waiting = stats.waiting,
            active = stats.active,
            exhausted = stats.exhausted,
            "Job queue connected"
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.ready.store(false, Ordering::Release);
        tracing::info!("Job queue disconnected");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn push(&self, job: NewJob) -> Result<JobHandle> {
        self.ensure_ready()?;

        let id = Uuid::new_v4().to_string();
        let record_count = job.records.len();
        let job_id = id.clone();
        blocking(&self.db, move |db| {
            db.insert_job(
                &job_id,
                &job.records,
                job.options.max_attempts,
                duration_ms(job.options.backoff),
                now_ms(),
            )
        })
        .await?;

        Ok(JobHandle {
            job_id: id,
            record_count,
        })
    }

    async fn claim(&self, lease: Duration) -> Result<Option<IngestionJob>> {
        self.ensure_ready()?;
        let lease_ms = duration_ms(lease);
        blocking(&self.db, move |db| db.claim_job(now_ms(), lease_ms)).await
    }

    async fn complete(&self, job: &IngestionJob) -> Result<bool> {
        self.ensure_ready()?;
        let (id, attempt) = (job.id.clone(), job.attempts_made);
        blocking(&self.db, move |db| db.complete_job(&id, attempt)).await
    }

    async fn fail(&self, job: &IngestionJob, error: &str) -> Result<FailDisposition> {
        self.ensure_ready()?;
        let (id, attempt, error) = (job.id.clone(), job.attempts_made, error.to_string());
        let disposition = blocking(&self.db, move |db| db.fail_job(&id, attempt, &error, now_ms()))
            .await?
            .unwrap_or(FailDisposition::Superseded);
        Ok(disposition)
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobSummary>> {
        self.ensure_ready()?;
        let id = job_id.to_string();
        blocking(&self.db, move |db| db.get_job(&id)).await
    }

    async fn exhausted(&self, limit: u32) -> Result<Vec<JobSummary>> {
        self.ensure_ready()?;
        blocking(&self.db, move |db| db.list_jobs(JobState::Exhausted, limit)).await
    }

    async fn retry(&self, job_id: &str) -> Result<bool> {
        self.ensure_ready()?;
        let id = job_id.to_string();
        blocking(&self.db, move |db| db.rearm_job(&id, now_ms())).await
    }

    async fn stats(&self) -> Result<QueueStats> {
        self.ensure_ready()?;
        blocking(&self.db, |db| db.job_stats()).await
    }
}
