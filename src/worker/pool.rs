//! Bounded pool of batch worker slots draining the ingestion queue

use super::BatchWorker;
use crate::config::QueueConfig;
use crate::queue::{FailDisposition, IngestionJob, IngestionQueue, QueueClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

/// Worker pool configuration and collaborators
pub struct WorkerPool {
    queue: Arc<IngestionQueue>,
    worker: Arc<BatchWorker>,
    slots: usize,
    poll_interval: Duration,
    lease: Duration,
}

/// Handle to a running pool
pub struct WorkerPoolHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerPoolHandle {
    /// Stop claiming new jobs and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("Worker pool task failed: {}", e);
        }
        info!("Worker pool stopped");
    }
}

impl WorkerPool {
    pub fn new(queue: Arc<IngestionQueue>, worker: Arc<BatchWorker>, config: &QueueConfig) -> Self {
        Self {
            queue,
            worker,
            slots: config.worker_slots.max(1),
            poll_interval: config.poll_interval,
            lease: config.lease,
        }
    }

    /// Start the dispatcher on the current runtime
    pub fn spawn(self) -> WorkerPoolHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        WorkerPoolHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(slots = self.slots, "Worker pool started");

        let semaphore = Arc::new(Semaphore::new(self.slots));
        let notify = self.queue.notifier();
        let mut in_flight = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            while let Some(result) = in_flight.try_join_next() {
                if let Err(e) = result {
                    error!("Worker slot panicked: {}", e);
                }
            }

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.changed() => break,
            };

            match self.queue.client().claim(self.lease).await {
                Ok(Some(job)) => {
                    let worker = self.worker.clone();
                    let client = self.queue.client().clone();
                    in_flight.spawn(async move {
                        run_job(&worker, client.as_ref(), job).await;
                        drop(permit);
                    });
                    // More work may be due right away
                    continue;
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    warn!(error = %e, "Failed to claim job");
                }
            }

            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Waiting for in-flight jobs");
        }
        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!("Worker slot panicked: {}", e);
            }
        }
    }
}

/// Process one claimed job and acknowledge the result to the queue
async fn run_job(worker: &BatchWorker, client: &dyn QueueClient, job: IngestionJob) {
    info!(
        job_id = %job.id,
        attempt = job.attempts_made,
        max_attempts = job.max_attempts,
        records = job.records.len(),
        "Processing ingestion job"
    );

    match worker.process(&job).await {
        Ok(outcome) => match client.complete(&job).await {
            Ok(true) => info!(
                job_id = %job.id,
                success_count = outcome.success_count,
                failed_count = outcome.failed_count,
                "Ingestion job completed"
            ),
            Ok(false) => warn!(
                job_id = %job.id,
                attempt = job.attempts_made,
                success_count = outcome.success_count,
                failed_count = outcome.failed_count,
                "Ingestion job finished after its lease was taken over"
            ),
            Err(e) => error!(job_id = %job.id, error = %e, "Failed to acknowledge completed job"),
        },
        Err(e) => {
            let reason = e.to_string();
            match client.fail(&job, &reason).await {
                Ok(FailDisposition::Retrying { attempts_made, run_at_ms }) => warn!(
                    job_id = %job.id,
                    attempt = attempts_made,
                    run_at_ms,
                    error = %reason,
                    "Ingestion job failed, retry scheduled"
                ),
                Ok(FailDisposition::Exhausted { attempts_made }) => error!(
                    job_id = %job.id,
                    attempts = attempts_made,
                    error = %reason,
                    "Ingestion job exhausted its attempts"
                ),
                Ok(FailDisposition::Superseded) => warn!(
                    job_id = %job.id,
                    attempt = job.attempts_made,
                    error = %reason,
                    "Ingestion job failed after its lease was taken over"
                ),
                Err(ack) => error!(job_id = %job.id, error = %ack, "Failed to record job failure"),
            }
        }
    }
}
