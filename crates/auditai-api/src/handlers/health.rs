//! Health Check Handler

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "auditai-backend";

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
    pub service: String,
    /// Configured LLM provider (azure or ollama)
    pub provider: String,
    /// Service version
    pub version: String,
}

/// Health check endpoint
///
/// Lightweight liveness check. It never calls the LLM provider and is not
/// behind the API key gate.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        provider: state.provider_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
