//! HTTP server for the REST API
//!
//! Provides:
//! - Batch ingestion (/api/uploadFinancialData)
//! - Paginated risk assessment (/api/getRiskAssessment)
//! - Queue operator endpoints (/api/jobs/*, /api/queue/*)

use super::auth::auth_middleware;
use super::handlers;
use super::rate_limiter::{rate_limit_middleware, RateLimiterState};
use crate::error::Result;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let rate_limiter = Arc::new(RateLimiterState::new(&state.config.rate_limit));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // ================================================================
        // Financial data
        // ================================================================
        .route("/uploadFinancialData", post(handlers::upload_financial_data))
        .route("/getRiskAssessment", get(handlers::get_risk_assessment))
        // ================================================================
        // Queue operations
        // ================================================================
        .route("/jobs/:job_id", get(handlers::get_job))
        .route("/jobs/:job_id/retry", post(handlers::retry_job))
        .route("/queue/exhausted", get(handlers::list_exhausted_jobs))
        .route("/queue/stats", get(handlers::queue_stats))
        // Rate limiting sees the identity attached by authentication
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server manager
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Create a new server
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Bind the configured address and start serving.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 is requested.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let host = self.state.config.server.host.clone();
        let port = self.state.config.server.port;

        let listener = TcpListener::bind((host.as_str(), port)).await?;
        let addr = listener.local_addr()?;

        let app = build_router(self.state.clone());

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting API server on {}", addr);

        let task = tokio::spawn(async move {
            let server = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        });
        self.task = Some(task);

        info!("=== Endpoints ===");
        info!("  GET  http://{}/health", addr);
        info!("  POST http://{}/api/uploadFinancialData", addr);
        info!("  GET  http://{}/api/getRiskAssessment", addr);
        info!("  GET  http://{}/api/jobs/{{job_id}}", addr);
        info!("  POST http://{}/api/jobs/{{job_id}}/retry", addr);
        info!("  GET  http://{}/api/queue/exhausted", addr);
        info!("  GET  http://{}/api/queue/stats", addr);

        Ok(addr)
    }

    /// Stop the server and wait for open connections to finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("API server task failed: {}", e);
            }
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
