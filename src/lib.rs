//! FinRisk - Financial Risk Assessment Service
//!
//! Ingests batches of company financial records through a durable queue,
//! persists them with idempotent upserts and serves cached, paginated risk
//! assessments computed from the stored figures.

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod services;
pub mod state;
pub mod store;
pub mod worker;

use api::ApiServer;
use cache::ResponseCache;
use config::AppConfig;
use db::sqlite::SqliteDb;
use error::Result;
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finrisk=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the service until Ctrl-C
pub async fn run(config: AppConfig) -> Result<()> {
    tracing::info!("Starting FinRisk...");

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    tracing::info!("Database: {:?}", config.database.path);
    let sqlite = Arc::new(SqliteDb::new(&config.database.path)?);

    let state = Arc::new(AppState::new(sqlite, config));
    state.ensure_api_key()?;
    state.connect().await?;

    let workers = state.worker_pool().spawn();
    let sweeper = spawn_cache_sweeper(state.cache.clone(), state.config.cache.sweep_interval);

    let mut server = ApiServer::new(state.clone());
    let started = server.start().await;

    if started.is_ok() {
        tracing::info!("Application state initialized");
        shutdown_signal().await;
    }

    server.stop().await;
    workers.shutdown().await;
    sweeper.abort();
    state.disconnect().await;

    started.map(|_| ())
}

/// Periodically drop expired cache entries
fn spawn_cache_sweeper(cache: Arc<ResponseCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let removed = cache.sweep().await;
            if removed > 0 {
                tracing::debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
