//! Ingestion job backlog

use crate::error::Result;
use crate::queue::{FailDisposition, IngestionJob, JobState, JobSummary, QueueStats};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

const SUMMARY_COLUMNS: &str = "id, state, record_count, attempts_made, max_attempts, run_at,
     last_error, created_at, updated_at";

/// Insert a new waiting job
pub fn insert_job(
    conn: &Connection,
    id: &str,
    records: &[Value],
    max_attempts: u32,
    backoff_ms: i64,
    run_at_ms: i64,
) -> Result<()> {
    let payload = serde_json::to_string(records)?;

    conn.execute(
        "INSERT INTO ingestion_jobs (id, payload, record_count, state, max_attempts, backoff_ms, run_at)
         VALUES (?1, ?2, ?3, 'waiting', ?4, ?5, ?6)",
        params![id, payload, records.len() as i64, max_attempts, backoff_ms, run_at_ms],
    )?;

    Ok(())
}

/// Claim the oldest due job.
///
/// Due means waiting with `run_at <= now`, or active with an expired lease
/// (its worker is presumed dead). A job whose lease expired on its final
/// attempt is exhausted instead of being redelivered.
pub fn claim_next(conn: &mut Connection, now_ms: i64, lease_ms: i64) -> Result<Option<IngestionJob>> {
    let tx = conn.transaction()?;

    let claimed = loop {
        let candidate = tx
            .query_row(
                "SELECT id, payload, attempts_made, max_attempts
                 FROM ingestion_jobs
                 WHERE (state = 'waiting' AND run_at <= ?1)
                    OR (state = 'active' AND lease_until <= ?1)
                 ORDER BY run_at, seq
                 LIMIT 1",
                params![now_ms],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, payload, attempts_made, max_attempts)) = candidate else {
            break None;
        };

        if attempts_made >= max_attempts {
            tx.execute(
                "UPDATE ingestion_jobs
                 SET state = 'exhausted', lease_until = NULL,
                     last_error = COALESCE(last_error, 'lease expired on final attempt'),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                params![id],
            )?;
            tracing::warn!(job_id = %id, attempts_made, "Stalled job exhausted its attempts");
            continue;
        }

        tx.execute(
            "UPDATE ingestion_jobs
             SET state = 'active', attempts_made = attempts_made + 1,
                 lease_until = ?2, updated_at = datetime('now')
             WHERE id = ?1",
            params![id, now_ms + lease_ms],
        )?;

        let records: Vec<Value> = serde_json::from_str(&payload)?;
        break Some(IngestionJob {
            id,
            records,
            attempts_made: attempts_made + 1,
            max_attempts,
        });
    };

    tx.commit()?;
    Ok(claimed)
}

/// Remove a finished job.
///
/// Only the claim for `attempt` may do this. Returns false when the job was
/// redelivered, exhausted or removed since.
pub fn complete_job(conn: &Connection, id: &str, attempt: u32) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM ingestion_jobs WHERE id = ?1 AND state = 'active' AND attempts_made = ?2",
        params![id, attempt],
    )?;
    Ok(deleted > 0)
}

/// Record a failed attempt.
///
/// Returns `None` without touching the job when `attempt` is no longer the
/// live claim on it.
pub fn fail_job(
    conn: &mut Connection,
    id: &str,
    attempt: u32,
    error: &str,
    now_ms: i64,
) -> Result<Option<FailDisposition>> {
    let tx = conn.transaction()?;

    let job = tx
        .query_row(
            "SELECT attempts_made, max_attempts, backoff_ms FROM ingestion_jobs
             WHERE id = ?1 AND state = 'active' AND attempts_made = ?2",
            params![id, attempt],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?, row.get::<_, i64>(2)?)),
        )
        .optional()?;

    let Some((attempts_made, max_attempts, backoff_ms)) = job else {
        return Ok(None);
    };

    let disposition = if attempts_made >= max_attempts {
        tx.execute(
            "UPDATE ingestion_jobs
             SET state = 'exhausted', lease_until = NULL, last_error = ?2,
                 updated_at = datetime('now')
             WHERE id = ?1",
            params![id, error],
        )?;
        FailDisposition::Exhausted { attempts_made }
    } else {
        let run_at_ms = now_ms + backoff_ms;
        tx.execute(
            "UPDATE ingestion_jobs
             SET state = 'waiting', lease_until = NULL, last_error = ?2, run_at = ?3,
                 updated_at = datetime('now')
             WHERE id = ?1",
            params![id, error, run_at_ms],
        )?;
        FailDisposition::Retrying {
            attempts_made,
            run_at_ms,
        }
    };

    tx.commit()?;
    Ok(Some(disposition))
}

/// Look up a stored job
pub fn get_job(conn: &Connection, id: &str) -> Result<Option<JobSummary>> {
    let sql = format!("SELECT {} FROM ingestion_jobs WHERE id = ?1", SUMMARY_COLUMNS);
    let job = conn.query_row(&sql, params![id], map_summary).optional()?;
    Ok(job)
}

/// Jobs in a given state, oldest first
pub fn list_jobs(conn: &Connection, state: JobState, limit: u32) -> Result<Vec<JobSummary>> {
    let sql = format!(
        "SELECT {} FROM ingestion_jobs WHERE state = ?1 ORDER BY seq LIMIT ?2",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![state.as_str(), limit], map_summary)?;

    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row?);
    }
    Ok(jobs)
}

/// Re-arm an exhausted job with a fresh attempt budget
pub fn rearm_exhausted(conn: &Connection, id: &str, now_ms: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE ingestion_jobs
         SET state = 'waiting', attempts_made = 0, run_at = ?2, lease_until = NULL,
             updated_at = datetime('now')
         WHERE id = ?1 AND state = 'exhausted'",
        params![id, now_ms],
    )?;
    Ok(updated > 0)
}

/// Count stored jobs per state
pub fn count_by_state(conn: &Connection) -> Result<QueueStats> {
    let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM ingestion_jobs GROUP BY state")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;

    let mut stats = QueueStats::default();
    for row in rows {
        let (state, count) = row?;
        match JobState::parse(&state) {
            Some(JobState::Waiting) => stats.waiting = count,
            Some(JobState::Active) => stats.active = count,
            Some(JobState::Exhausted) => stats.exhausted = count,
            None => tracing::warn!("Unknown job state in backlog: {}", state),
        }
    }
    Ok(stats)
}

fn map_summary(row: &Row<'_>) -> rusqlite::Result<JobSummary> {
    let state: String = row.get(1)?;
    let state = JobState::parse(&state).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown job state '{}'", state).into(),
        )
    })?;

    Ok(JobSummary {
        job_id: row.get(0)?,
        state,
        record_count: row.get::<_, i64>(2)? as usize,
        attempts_made: row.get(3)?,
        max_attempts: row.get(4)?,
        run_at_ms: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
