//! Ingestion job types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Lifecycle state of a queued job.
///
/// Completed jobs are deleted from the backlog, so a stored job is always
/// waiting, active or exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    /// Attempt budget consumed; kept for operator inspection
    Exhausted,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Exhausted => "exhausted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(JobState::Waiting),
            "active" => Some(JobState::Active),
            "exhausted" => Some(JobState::Exhausted),
            _ => None,
        }
    }
}

/// Retry policy attached to every job at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

/// A batch about to be enqueued
#[derive(Debug, Clone)]
pub struct NewJob {
    pub records: Vec<Value>,
    pub options: JobOptions,
}

/// Returned to the submitter once a batch is durably queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub job_id: String,
    pub record_count: usize,
}

/// A job claimed by a worker attempt
#[derive(Debug, Clone)]
pub struct IngestionJob {
    pub id: String,
    pub records: Vec<Value>,
    /// Includes the current attempt
    pub attempts_made: u32,
    pub max_attempts: u32,
}

/// Per-record tally of a completed job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub success_count: usize,
    pub failed_count: usize,
}

/// What the queue did with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailDisposition {
    /// Re-armed; eligible again at `run_at_ms` (unix millis)
    Retrying { attempts_made: u32, run_at_ms: i64 },
    /// Attempt budget consumed
    Exhausted { attempts_made: u32 },
    /// The job was redelivered or finished under a newer claim; left as is
    Superseded,
}

/// Operator view of a stored job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub state: JobState,
    pub record_count: usize,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub run_at_ms: i64,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Stored job counts per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub exhausted: u64,
}
