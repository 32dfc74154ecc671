//! Explain Handler

use auditai_ledger::Transaction;
use axum::{extract::State, Json};
use std::borrow::Cow;
use std::sync::Arc;

use crate::dto::{ExplainRequest, ExplainResponse};
use crate::error::{ApiError, ApiResult};
use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// Explain why a transaction was flagged
///
/// Accepts either a dataset `transaction_id` or a full `transaction` payload.
/// When both are sent they must refer to the same transaction.
#[utoipa::path(
    post,
    path = "/explain",
    tag = "Copilot",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Structured explanation", body = ExplainResponse),
        (status = 400, description = "Missing or mismatched transaction", body = crate::error::ErrorResponse),
        (status = 404, description = "Transaction not found", body = crate::error::ErrorResponse),
        (status = 502, description = "LLM provider request failed", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn explain_transaction(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ExplainRequest>,
) -> ApiResult<Json<ExplainResponse>> {
    let transaction = resolve_transaction(&state, request)?;

    let explanation = state.orchestrator.explain(&transaction).await?;

    Ok(Json(ExplainResponse::new(
        transaction.transaction_id.clone(),
        explanation,
    )))
}

fn resolve_transaction(
    state: &AppState,
    request: ExplainRequest,
) -> ApiResult<Cow<'_, Transaction>> {
    // Whitespace-only ids count as missing
    let transaction_id = request
        .transaction_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());

    match (request.transaction, transaction_id) {
        (Some(transaction), Some(id)) if transaction.transaction_id.trim() != id => {
            Err(ApiError::BadRequest(
                "transaction_id does not match request.transaction.transaction_id".to_string(),
            ))
        }
        (Some(transaction), _) => Ok(Cow::Owned(transaction)),
        (None, Some(id)) => Ok(Cow::Borrowed(state.dataset.get_by_id(id)?)),
        (None, None) => Err(ApiError::BadRequest(
            "Provide transaction_id or transaction payload".to_string(),
        )),
    }
}
