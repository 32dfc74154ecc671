//! API Routes
//!
//! Route definitions for all API endpoints.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::handlers;
use crate::middleware::{require_api_key, track_metrics};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// All service routes.
///
/// Everything except `/health` sits behind the API key gate. Request metrics
/// wrap the gate so rejected requests are counted too.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        // Observability
        .route("/metrics", get(handlers::metrics::metrics_json))
        .route("/metrics/prometheus", get(handlers::metrics::metrics_prometheus))
        // Dataset
        .route("/anomalies", get(handlers::anomalies::list_anomalies))
        .route("/anomaly/:transaction_id", get(handlers::anomalies::get_anomaly))
        // Copilot
        .route("/explain", post(handlers::explain::explain_transaction))
        .route("/audit-report", post(handlers::report::generate_audit_report))
        .route("/chat", post(handlers::chat::chat_with_ledger))
        // Documentation
        .route("/openapi.json", get(openapi_json))
        .route_layer(from_fn_with_state(state.clone(), require_api_key));

    let public = Router::new().route("/health", get(handlers::health::health_check));

    protected
        .merge(public)
        .route_layer(from_fn_with_state(state, track_metrics))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
