//! Anomaly Handlers
//!
//! Read-only access to the flagged transactions loaded at startup.

use auditai_ledger::Transaction;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::dto::AnomalyListResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// List all flagged transactions
#[utoipa::path(
    get,
    path = "/anomalies",
    tag = "Anomalies",
    responses(
        (status = 200, description = "Flagged transactions", body = AnomalyListResponse),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn list_anomalies(State(state): State<Arc<AppState>>) -> Json<AnomalyListResponse> {
    Json(AnomalyListResponse::from(state.dataset.list_anomalies()))
}

/// Get one flagged transaction
#[utoipa::path(
    get,
    path = "/anomaly/{transaction_id}",
    tag = "Anomalies",
    params(
        ("transaction_id" = String, Path, description = "Transaction id; surrounding whitespace is ignored")
    ),
    responses(
        (status = 200, description = "Transaction found", body = Transaction),
        (status = 404, description = "Transaction not found", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn get_anomaly(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<Transaction>> {
    let transaction = state.dataset.get_by_id(&transaction_id)?;
    Ok(Json(transaction.clone()))
}
