//! API token authentication middleware

use crate::db::sqlite::ApiKey;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Authenticated caller, attached to the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key_id: i64,
    pub name: String,
}

impl From<ApiKey> for Identity {
    fn from(key: ApiKey) -> Self {
        Self {
            key_id: key.id,
            name: key.name,
        }
    }
}

/// Token from the `token` cookie or an `Authorization: Bearer` header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "token")
        .map(|(_, value)| value.trim().to_string());

    let token = from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|value| value.trim().to_string())
    });

    token.filter(|t| !t.is_empty())
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.server.auth_required {
        return next.run(request).await;
    }

    let Some(token) = extract_token(request.headers()) else {
        tracing::debug!("Rejected request without token: {}", request.uri().path());
        return AppError::Auth("Token is missing".to_string()).into_response();
    };

    match state.sqlite.validate_api_key(&token) {
        Ok(key) => {
            request.extensions_mut().insert(Identity::from(key));
            next.run(request).await
        }
        Err(AppError::Auth(_)) => {
            tracing::warn!("Rejected request with invalid token: {}", request.uri().path());
            AppError::Auth("Token is invalid".to_string()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=from-cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_missing_or_blank_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&headers), None);
    }
}
