//! API Middleware
//!
//! Middleware components for the API layer.

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ApiError, ErrorResponse};
use crate::extractors::REQUEST_ID_HEADER;
use crate::state::AppState;

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Static API key gate. A no-op when no key is configured.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        next.run(req).await
    } else {
        tracing::warn!(path = %req.uri().path(), "Rejected request with missing or invalid API key");
        ApiError::Unauthorized.into_response()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Request counting and access logging, keyed by the matched route template
pub async fn track_metrics(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    state
        .metrics
        .record_request(method.as_str(), &path, latency, status);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        latency_ms = latency.as_secs_f64() * 1000.0,
        "Request completed"
    );

    response
}

/// Copy the request id into JSON error bodies produced by [`ApiError`]
pub async fn stamp_request_id(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(req).await;

    let Some(mut error) = response.extensions_mut().remove::<ErrorResponse>() else {
        return response;
    };
    error.request_id = request_id;

    let body = match serde_json::to_vec(&error) {
        Ok(body) => body,
        Err(_) => return response,
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http, http::StatusCode, middleware::from_fn, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret-longer"));
        assert!(!constant_time_eq(b"", b"secret"));
    }

    #[tokio::test]
    async fn test_stamp_request_id_rewrites_error_body() {
        let app = Router::new()
            .route(
                "/missing",
                get(|| async { ApiError::NotFound("Transaction not found".into()) }),
            )
            .layer(from_fn(stamp_request_id));

        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/missing")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, "NOT_FOUND");
        assert_eq!(body.request_id.as_deref(), Some("req-123"));
    }

    #[tokio::test]
    async fn test_stamp_request_id_leaves_success_untouched() {
        let app = Router::new()
            .route("/ok", get(|| async { "fine" }))
            .layer(from_fn(stamp_request_id));

        let response = app
            .oneshot(http::Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"fine");
    }
}
