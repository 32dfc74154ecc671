//! OpenAPI Documentation
//!
//! OpenAPI 3.0 specification for the AuditAI API, served at `/openapi.json`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::dto;
use crate::error::ErrorResponse;
use crate::handlers;
use crate::middleware::API_KEY_HEADER;

/// AuditAI API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AuditAI API",
        description = "Forensic audit copilot: flagged ledger transactions explained and summarized by an LLM.",
        license(
            name = "Apache-2.0",
            url = "https://www.apache.org/licenses/LICENSE-2.0"
        )
    ),
    paths(
        handlers::health::health_check,
        handlers::metrics::metrics_json,
        handlers::metrics::metrics_prometheus,
        handlers::anomalies::list_anomalies,
        handlers::anomalies::get_anomaly,
        handlers::explain::explain_transaction,
        handlers::report::generate_audit_report,
        handlers::chat::chat_with_ledger,
    ),
    components(
        schemas(
            ErrorResponse,
            handlers::health::HealthResponse,
            auditai_metrics::MetricsSnapshot,
            auditai_metrics::RouteSnapshot,
            auditai_metrics::ProviderSnapshot,
            auditai_ledger::Transaction,
            auditai_ledger::RiskDistribution,
            dto::AnomalyListResponse,
            dto::ExplainRequest,
            dto::ExplainResponse,
            dto::AuditReportRequest,
            dto::AuditReportResponse,
            dto::ChatRequest,
            dto::ChatResponse,
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Observability", description = "Request and LLM counters"),
        (name = "Anomalies", description = "Flagged transactions from the loaded dataset"),
        (name = "Copilot", description = "LLM explanations, audit reports and chat")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier
pub struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}
