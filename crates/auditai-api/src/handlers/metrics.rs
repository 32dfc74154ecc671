//! Metrics Handlers

use auditai_metrics::MetricsSnapshot;
use axum::{extract::State, http::header, response::IntoResponse, Json};
use std::sync::Arc;

use crate::state::AppState;

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// JSON snapshot of request and LLM counters
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Counter snapshot", body = MetricsSnapshot),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn metrics_json(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Same counters in the Prometheus text exposition format
#[utoipa::path(
    get,
    path = "/metrics/prometheus",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus exposition", content_type = "text/plain", body = String),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn metrics_prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render_prometheus(),
    )
}
