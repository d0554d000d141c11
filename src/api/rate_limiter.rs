//! Rate limiting middleware for the REST API
//!
//! Fixed-window limiting keyed by the authenticated identity, or by the
//! client address for unauthenticated requests. Every response carries the
//! standard `RateLimit-*` headers.

use super::auth::Identity;
use crate::config::RateLimitConfig;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Requests counted for one key in the current window
#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets
    pub reset_after: Duration,
}

/// Shared rate limiter state
#[derive(Debug)]
pub struct RateLimiterState {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request for `key` at `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock();

        // Forget windows that ended so idle clients do not accumulate
        if windows.len() > 10_000 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        let allowed = entry.count < self.max_requests;
        if allowed {
            entry.count += 1;
        }

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(now.duration_since(entry.started)),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

/// Limiter key for a request: identity first, then client address
pub fn rate_limit_key(request: &Request<Body>) -> String {
    if let Some(identity) = request.extensions().get::<Identity>() {
        return format!("key:{}", identity.key_id);
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = rate_limit_key(&request);
    let decision = state.check(&key);

    if !decision.allowed {
        tracing::warn!(
            "Rate limit exceeded for {}, path: {}, retry after {}s",
            key,
            request.uri().path(),
            reset_seconds(decision.reset_after)
        );
        return rate_limit_response(decision);
    }

    let mut response = next.run(request).await;
    insert_rate_limit_headers(response.headers_mut(), &decision);
    response
}

fn reset_seconds(reset_after: Duration) -> u64 {
    reset_after.as_secs_f64().ceil() as u64
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_seconds(decision.reset_after)));
}

/// Create a rate limit exceeded response
fn rate_limit_response(decision: RateLimitDecision) -> Response {
    let body = Json(json!({
        "message": "Too many requests, please try again later."
    }));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::RETRY_AFTER,
        HeaderValue::from(reset_seconds(decision.reset_after)),
    );
    insert_rate_limit_headers(headers, &decision);

    response
}
