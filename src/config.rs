//! Runtime configuration
//!
//! Every setting has a default; `FINRISK_*` environment variables override
//! them at startup.

use crate::error::{AppError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reject requests without a valid API token
    pub auth_required: bool,
}

/// SQLite database location
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Ingestion queue and worker pool configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub worker_slots: usize,
    pub poll_interval: Duration,
    /// How long a claimed job may stay active before it is redelivered
    pub lease: Duration,
    pub max_batch_size: usize,
}

/// Response cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

/// Risk assessment query configuration
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Write recomputed derived metrics back to the store on cache miss
    pub persist_derived: bool,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Per-identity request limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub risk: RiskConfig,
    pub rate_limit: RateLimitConfig,
    /// API key seeded into the key store at startup
    pub bootstrap_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            auth_required: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("finrisk.db"),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
            worker_slots: 4,
            poll_interval: Duration::from_secs(1),
            lease: Duration::from_secs(300),
            max_batch_size: 500,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            persist_derived: true,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            cache: CacheConfig::default(),
            risk: RiskConfig::default(),
            rate_limit: RateLimitConfig::default(),
            bootstrap_api_key: None,
        }
    }
}

impl AppConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("FINRISK_HOST") {
            config.server.host = host;
        }
        config.server.port = parse_or(&lookup, "FINRISK_PORT", config.server.port)?;
        config.server.auth_required =
            parse_or(&lookup, "FINRISK_AUTH_REQUIRED", config.server.auth_required)?;

        if let Some(path) = lookup("FINRISK_DATABASE_PATH") {
            config.database.path = PathBuf::from(path);
        }

        config.queue.max_attempts =
            parse_or(&lookup, "FINRISK_QUEUE_MAX_ATTEMPTS", config.queue.max_attempts)?;
        config.queue.backoff = secs_or(&lookup, "FINRISK_QUEUE_BACKOFF_SECS", config.queue.backoff)?;
        config.queue.worker_slots =
            parse_or(&lookup, "FINRISK_WORKER_SLOTS", config.queue.worker_slots)?;
        config.queue.poll_interval = millis_or(
            &lookup,
            "FINRISK_QUEUE_POLL_MS",
            config.queue.poll_interval,
        )?;
        config.queue.lease = secs_or(&lookup, "FINRISK_QUEUE_LEASE_SECS", config.queue.lease)?;

        config.cache.ttl = secs_or(&lookup, "FINRISK_CACHE_TTL_SECS", config.cache.ttl)?;
        config.cache.sweep_interval = secs_or(
            &lookup,
            "FINRISK_CACHE_SWEEP_SECS",
            config.cache.sweep_interval,
        )?;

        config.risk.persist_derived =
            parse_or(&lookup, "FINRISK_PERSIST_DERIVED", config.risk.persist_derived)?;
        config.risk.max_page_size =
            parse_or(&lookup, "FINRISK_MAX_PAGE_SIZE", config.risk.max_page_size)?;

        config.rate_limit.max_requests = parse_or(
            &lookup,
            "FINRISK_RATE_LIMIT_MAX",
            config.rate_limit.max_requests,
        )?;
        config.rate_limit.window = secs_or(
            &lookup,
            "FINRISK_RATE_LIMIT_WINDOW_SECS",
            config.rate_limit.window,
        )?;

        config.bootstrap_api_key = lookup("FINRISK_API_KEY").filter(|k| !k.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue.max_attempts == 0 {
            return Err(AppError::Config("queue max attempts must be at least 1".to_string()));
        }
        if self.queue.worker_slots == 0 {
            return Err(AppError::Config("worker slots must be at least 1".to_string()));
        }
        if self.risk.max_page_size == 0 {
            return Err(AppError::Config("max page size must be at least 1".to_string()));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window.is_zero() {
            return Err(AppError::Config("rate limit must allow at least one request".to_string()));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: {} ({})", key, raw, e))),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_millis() as u64).map(Duration::from_millis)
}
