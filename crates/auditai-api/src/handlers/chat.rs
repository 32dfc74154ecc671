//! Chat Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::dto::{ChatRequest, ChatResponse};
use crate::error::ApiResult;
use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// Answer a free-text question grounded on flagged transactions
#[utoipa::path(
    post,
    path = "/chat",
    tag = "Copilot",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer", body = ChatResponse),
        (status = 400, description = "Invalid question or max_transactions", body = crate::error::ErrorResponse),
        (status = 502, description = "LLM provider request failed", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn chat_with_ledger(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let anomalies = state.dataset.list_anomalies();
    let context = &anomalies[..request.max_transactions.min(anomalies.len())];

    let answer = state
        .orchestrator
        .chat(request.trimmed_question(), context)
        .await?;

    Ok(Json(ChatResponse {
        answer,
        context_rows: context.len(),
    }))
}
