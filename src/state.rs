//! Application state management

use crate::cache::{CacheClient, MemoryCache, ResponseCache};
use crate::config::AppConfig;
use crate::db::sqlite::{SqliteDb, SqliteJobQueue, SqliteRecordStore};
use crate::error::Result;
use crate::queue::{IngestionQueue, QueueClient};
use crate::services::{IngestionService, RiskService};
use crate::store::RecordStore;
use crate::worker::{BatchWorker, WorkerPool};
use std::sync::Arc;

/// Name under which the startup API key is stored
const BOOTSTRAP_KEY_NAME: &str = "bootstrap";

/// Application state shared by handlers, workers and background tasks
pub struct AppState {
    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// Financial record store
    pub store: Arc<dyn RecordStore>,

    /// Ingestion queue front
    pub queue: Arc<IngestionQueue>,

    /// Risk assessment response cache
    pub cache: Arc<ResponseCache>,

    pub ingestion: IngestionService,

    pub risk: RiskService,

    pub config: AppConfig,
}

impl AppState {
    /// Wire every component on top of an open database.
    ///
    /// Queue and cache clients start disconnected; call [`AppState::connect`].
    pub fn new(sqlite: Arc<SqliteDb>, config: AppConfig) -> Self {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(sqlite.clone()));

        let queue_client: Arc<dyn QueueClient> = Arc::new(SqliteJobQueue::new(sqlite.clone()));
        let queue = Arc::new(IngestionQueue::new(queue_client, &config.queue));

        let cache_client: Arc<dyn CacheClient> = Arc::new(MemoryCache::new());
        let cache = Arc::new(ResponseCache::new(cache_client, config.cache.ttl));

        let ingestion = IngestionService::new(queue.clone());
        let risk = RiskService::new(store.clone(), cache.clone(), config.risk.clone());

        Self {
            sqlite,
            store,
            queue,
            cache,
            ingestion,
            risk,
            config,
        }
    }

    /// Connect the queue and cache clients.
    ///
    /// The queue is required. A cache that fails to connect only disables
    /// caching.
    pub async fn connect(&self) -> Result<()> {
        self.queue.client().connect().await?;

        if let Err(e) = self.cache.client().connect().await {
            tracing::warn!("Cache unavailable, serving without cache: {}", e);
        }
        Ok(())
    }

    /// Disconnect the queue and cache clients
    pub async fn disconnect(&self) {
        if let Err(e) = self.queue.client().disconnect().await {
            tracing::error!("Failed to disconnect queue: {}", e);
        }
        if let Err(e) = self.cache.client().disconnect().await {
            tracing::error!("Failed to disconnect cache: {}", e);
        }
    }

    /// Worker pool draining this state's queue into its store
    pub fn worker_pool(&self) -> WorkerPool {
        let worker = Arc::new(BatchWorker::new(self.store.clone()));
        WorkerPool::new(self.queue.clone(), worker, &self.config.queue)
    }

    /// Make sure at least one API key can authenticate requests.
    ///
    /// A configured bootstrap key is (re)stored under a fixed name. Without
    /// one, a key is generated on first start and logged once.
    pub fn ensure_api_key(&self) -> Result<()> {
        if let Some(key) = &self.config.bootstrap_api_key {
            return self.sqlite.seed_api_key(BOOTSTRAP_KEY_NAME, key);
        }

        if self.sqlite.has_api_key()? {
            return Ok(());
        }

        let (_, key) = self.sqlite.create_api_key(BOOTSTRAP_KEY_NAME)?;
        tracing::warn!("No API key configured. Generated one, store it now: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_makes_clients_ready() {
        let state = AppState::new(
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            AppConfig::default(),
        );
        assert!(!state.queue.client().is_ready());

        state.connect().await.unwrap();
        assert!(state.queue.client().is_ready());
        assert!(state.cache.client().is_ready());

        state.disconnect().await;
        assert!(!state.queue.client().is_ready());
    }

    #[test]
    fn test_bootstrap_key_validates() {
        let config = AppConfig {
            bootstrap_api_key: Some("k".repeat(64)),
            ..AppConfig::default()
        };
        let state = AppState::new(Arc::new(SqliteDb::open_in_memory().unwrap()), config);

        state.ensure_api_key().unwrap();
        assert!(state.sqlite.validate_api_key(&"k".repeat(64)).is_ok());
    }

    #[test]
    fn test_generates_key_once() {
        let state = AppState::new(
            Arc::new(SqliteDb::open_in_memory().unwrap()),
            AppConfig::default(),
        );

        state.ensure_api_key().unwrap();
        assert!(state.sqlite.has_api_key().unwrap());
        // Second start keeps the existing key
        state.ensure_api_key().unwrap();
    }
}
