//! Application error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed or oversized ingestion payload, rejected before enqueue
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single record could not be written; the batch carries on
    #[error("Record persist error: {0}")]
    RecordPersist(String),

    /// Systemic failure while processing a job; the whole job is retried
    #[error("Job processing fault: {0}")]
    JobProcessing(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Faults that are not attributable to one record and warrant
    /// retrying the whole job.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_)
                | AppError::QueueUnavailable(_)
                | AppError::JobProcessing(_)
                | AppError::Io(_)
        )
    }

    /// HTTP status used when the error reaches a handler boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Serializable error description
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let code = match err {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RecordPersist(_) => "RECORD_PERSIST_ERROR",
            AppError::JobProcessing(_) => "JOB_PROCESSING_FAULT",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::QueueUnavailable(_) => "QUEUE_UNAVAILABLE",
            AppError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = ErrorResponse::from(&self);

        let body = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) => json!({
                "error": msg,
                "code": detail.code,
            }),
            AppError::Auth(msg) => json!({
                "success": false,
                "message": msg,
            }),
            _ => {
                tracing::error!(code = %detail.code, "Request failed: {}", self);
                json!({
                    "error": "Internal server error",
                    "message": detail.message,
                    "code": detail.code,
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
