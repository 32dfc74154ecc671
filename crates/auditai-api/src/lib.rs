//! AuditAI REST API
//!
//! HTTP surface of the forensic audit copilot.
//!
//! # API Structure
//!
//! ```text
//! /
//! ├── /health                    - Liveness (never gated)
//! ├── /metrics                   - JSON counters
//! ├── /metrics/prometheus        - Prometheus text exposition
//! ├── /anomalies                 - All flagged transactions
//! ├── /anomaly/:transaction_id   - One flagged transaction
//! ├── /explain                   - LLM explanation of one transaction
//! ├── /audit-report              - LLM summary of flagged transactions
//! ├── /chat                      - Question answering over flagged transactions
//! └── /openapi.json              - OpenAPI document
//! ```
//!
//! # Authentication
//!
//! When an API key is configured every route except `/health` requires a
//! matching `x-api-key` header.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Enable CORS for browser clients
    pub enable_cors: bool,
    /// Allowed origins for CORS (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Enable request tracing spans
    pub enable_tracing: bool,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            enable_tracing: true,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Create the main API router with all middleware
pub fn create_router(state: Arc<AppState>, config: ApiConfig) -> Router {
    let mut router = routes::api_routes(state.clone())
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .with_state(state);

    // Add CORS
    if config.enable_cors {
        router = router.layer(cors_layer(&config.cors_origins));
    }

    // Error bodies pick up the request id on the way out
    router = router.layer(axum::middleware::from_fn(middleware::stamp_request_id));

    // Add tracing
    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(extractors::REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ));
    }

    // Outermost: assign the request id before anything else runs and echo it back
    let x_request_id = HeaderName::from_static(extractors::REQUEST_ID_HEADER);
    router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(
            origins
                .iter()
                .filter_map(|o| o.trim().parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
