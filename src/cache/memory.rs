//! In-process TTL cache

use super::CacheClient;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// `CacheClient` keeping entries in a concurrent map.
///
/// Expired entries are invisible to `get` and removed lazily, or in bulk by
/// `purge_expired`.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    ready: AtomicBool,
}

impl MemoryCache {
    /// A disconnected cache; call `connect` before use
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(AppError::CacheUnavailable("cache client is not connected".to_string()))
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn connect(&self) -> Result<()> {
        self.ready.store(true, Ordering::Release);
        tracing::info!("Memory cache connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.ready.store(false, Ordering::Release);
        self.entries.clear();
        tracing::info!("Memory cache disconnected");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_ready()?;

        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.ensure_ready()?;

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.ensure_ready()?;

        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
