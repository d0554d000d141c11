//! Response cache for risk assessment pages
//!
//! The cache is strictly best-effort: an unavailable backend or a failed
//! read is treated as a miss, and a failed write is logged and dropped.

mod fingerprint;
mod memory;

pub use fingerprint::fingerprint;
pub use memory::MemoryCache;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Key-value backend with per-entry expiry
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Value stored under `key`, unless absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}

/// Degrading front of a [`CacheClient`] with a fixed TTL
pub struct ResponseCache {
    client: Arc<dyn CacheClient>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(client: Arc<dyn CacheClient>, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    pub fn client(&self) -> &Arc<dyn CacheClient> {
        &self.client
    }

    /// Cached payload, or `None` on a miss or any cache fault
    pub async fn lookup(&self, key: &str) -> Option<String> {
        if !self.client.is_ready() {
            debug!(key = %key, "Cache not ready, treating as miss");
            return None;
        }

        match self.client.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a payload; failures are logged and never surface
    pub async fn store(&self, key: &str, value: String) {
        if !self.client.is_ready() {
            return;
        }

        if let Err(e) = self.client.set_ex(key, value, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Drop expired entries if the backend is up
    pub async fn sweep(&self) -> usize {
        if !self.client.is_ready() {
            return 0;
        }

        match self.client.purge_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Cache sweep failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    /// Backend that claims readiness but fails every call
    struct BrokenCache;

    #[async_trait]
    impl CacheClient for BrokenCache {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        fn is_ready(&self) -> bool {
            true
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::CacheUnavailable("connection reset".into()))
        }

        async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            Err(AppError::CacheUnavailable("connection reset".into()))
        }

        async fn purge_expired(&self) -> Result<usize> {
            Err(AppError::CacheUnavailable("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_hit_after_store() {
        let client = Arc::new(MemoryCache::new());
        client.connect().await.unwrap();
        let cache = ResponseCache::new(client, Duration::from_secs(60));

        assert_eq!(cache.lookup("k").await, None);
        cache.store("k", "payload".to_string()).await;
        assert_eq!(cache.lookup("k").await.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_not_ready_is_a_miss() {
        let cache = ResponseCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));

        cache.store("k", "payload".to_string()).await;
        assert_eq!(cache.lookup("k").await, None);
        assert_eq!(cache.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_faults_are_swallowed() {
        let cache = ResponseCache::new(Arc::new(BrokenCache), Duration::from_secs(60));

        cache.store("k", "payload".to_string()).await;
        assert_eq!(cache.lookup("k").await, None);
        assert_eq!(cache.sweep().await, 0);
    }
}
