//! Services Layer
//!
//! Business logic behind the REST API handlers. Handlers parse requests and
//! shape responses; services own the queue, store and cache interactions.
//!
//! # Services
//!
//! - `IngestionService` - Accept upload batches, inspect and re-arm jobs
//! - `RiskService` - Cached, paginated risk assessments

pub mod ingestion_service;
pub mod risk_service;

pub use ingestion_service::{IngestionService, UploadReceipt};
pub use risk_service::{AssessedRecord, RiskAssessmentBody, RiskAssessmentPage, RiskService};
