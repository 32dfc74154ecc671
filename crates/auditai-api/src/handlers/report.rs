//! Audit Report Handler

use auditai_ledger::RiskDistribution;
use axum::{extract::State, Json};
use std::sync::Arc;

use crate::dto::{AuditReportRequest, AuditReportResponse};
use crate::error::ApiResult;
use crate::extractors::ValidatedJson;
use crate::state::AppState;

/// Summarize the first `max_transactions` flagged transactions
#[utoipa::path(
    post,
    path = "/audit-report",
    tag = "Copilot",
    request_body = AuditReportRequest,
    responses(
        (status = 200, description = "Narrative audit summary", body = AuditReportResponse),
        (status = 400, description = "Invalid max_transactions", body = crate::error::ErrorResponse),
        (status = 502, description = "LLM provider request failed", body = crate::error::ErrorResponse)
    ),
    security(("api_key" = []))
)]
pub async fn generate_audit_report(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<AuditReportRequest>,
) -> ApiResult<Json<AuditReportResponse>> {
    let anomalies = state.dataset.list_anomalies();
    let subset = &anomalies[..request.max_transactions.min(anomalies.len())];

    let summary = state.orchestrator.audit_report(subset).await?;

    Ok(Json(AuditReportResponse {
        summary,
        total_flagged: anomalies.len(),
        analyzed: subset.len(),
        risk_distribution: RiskDistribution::from_transactions(subset),
    }))
}
