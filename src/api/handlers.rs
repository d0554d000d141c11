//! REST API endpoint handlers

use super::types::{ExhaustedJobsQuery, RiskAssessmentQuery};
use crate::cache::CacheClient;
use crate::error::Result;
use crate::queue::{JobSummary, QueueClient, QueueStats};
use crate::services::UploadReceipt;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint - GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "queue": state.queue.client().is_ready(),
        "cache": state.cache.client().is_ready(),
    }))
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Route not found" })))
}

// ============================================================================
// Financial Data
// ============================================================================

/// Upload a batch of financial records - POST /api/uploadFinancialData
///
/// The body is parsed here rather than by `Json` so malformed JSON gets the
/// same 400 shape as every other validation error.
pub async fn upload_financial_data(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<UploadReceipt>> {
    let receipt = state.ingestion.upload(&body).await?;
    info!(
        "Upload accepted: job {} with {} records",
        receipt.job_id, receipt.record_count
    );
    Ok(Json(receipt))
}

/// Paginated risk assessment - GET /api/getRiskAssessment
pub async fn get_risk_assessment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RiskAssessmentQuery>,
) -> Result<Response> {
    let page = query.page()?;
    let page_size = state.risk.page_size(query.limit()?)?;

    let body = state
        .risk
        .get_risk_assessment(&query.filter(), page, page_size)
        .await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body.json).into_response())
}

// ============================================================================
// Queue Operations
// ============================================================================

/// Job status - GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSummary>> {
    Ok(Json(state.ingestion.job_status(&job_id).await?))
}

/// Re-arm an exhausted job - POST /api/jobs/:job_id/retry
pub async fn retry_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSummary>> {
    Ok(Json(state.ingestion.retry_job(&job_id).await?))
}

/// Exhausted jobs - GET /api/queue/exhausted
pub async fn list_exhausted_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExhaustedJobsQuery>,
) -> Result<Json<Vec<JobSummary>>> {
    let limit = query.limit()?;
    Ok(Json(state.ingestion.exhausted_jobs(limit).await?))
}

/// Job counts per state - GET /api/queue/stats
pub async fn queue_stats(State(state): State<Arc<AppState>>) -> Result<Json<QueueStats>> {
    Ok(Json(state.ingestion.queue_stats().await?))
}
