//! API Integration Tests
//!
//! Drives the full router (middleware included) over an in-memory dataset and
//! a scripted LLM provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use auditai_api::{create_router, ApiConfig, AppState, ErrorResponse};
use auditai_ledger::DatasetStore;
use auditai_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, LlmOrchestrator, ProviderKind,
    RetryPolicy,
};
use auditai_metrics::MetricsRegistry;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

const DATASET: &str = "\
transaction_id,amount,account,label,vendor_email,vendor_iban
331521,1200.50,4100,local,ap@vendor.example,DE89370400440532013000
331522,80.00,4100,regular,ap@vendor.example,
331523,99000.00,6100,global,cfo@corp.example,GB29NWBK60161331926819
331524,15.25,7200,local,,
";

const EXPLANATION: &str = r#"```json
{"explanation": "Amount is far above the account norm.", "risk_level": "high",
 "possible_cause": "Duplicate invoice", "recommended_action": "Check the source document"}
```"#;

// =============================================================================
// Test helpers
// =============================================================================

/// Answers every call with the same result and keeps every prompt it was sent
struct StubProvider {
    result: Result<String, LLMError>,
    prompts: Mutex<Vec<String>>,
}

impl StubProvider {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: LLMError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for StubProvider {
    fn name(&self) -> &'static str {
        "Stub"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, request: CompletionRequest) -> auditai_llm::Result<CompletionResponse> {
        self.prompts.lock().unwrap().push(request.prompt_text());
        self.result.clone().map(CompletionResponse::new)
    }
}

struct TestApp {
    server: TestServer,
    metrics: Arc<MetricsRegistry>,
}

fn test_app(provider: Arc<StubProvider>, api_key: Option<&str>) -> TestApp {
    let dataset = DatasetStore::from_reader(DATASET.as_bytes()).unwrap();
    let metrics = Arc::new(MetricsRegistry::new());
    let orchestrator = LlmOrchestrator::new(provider, metrics.clone())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));

    let state = AppState::new(Arc::new(dataset), Arc::new(orchestrator), metrics.clone())
        .with_api_key(api_key.map(str::to_string));

    let router = create_router(Arc::new(state), ApiConfig::default());
    TestApp {
        server: TestServer::new(router).unwrap(),
        metrics,
    }
}

fn header(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static(name), HeaderValue::from_static(value))
}

// =============================================================================
// Health and dataset
// =============================================================================

#[tokio::test]
async fn test_health_reports_provider() {
    let app = test_app(StubProvider::answering("ok"), None);

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "auditai-backend");
    assert_eq!(body["provider"], "ollama");
}

#[tokio::test]
async fn test_list_anomalies_skips_regular_rows() {
    let app = test_app(StubProvider::answering("ok"), None);

    let response = app.server.get("/anomalies").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total"], 3);
    let ids: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["transaction_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["331521", "331523", "331524"]);
}

#[tokio::test]
async fn test_get_anomaly_trims_id() {
    let app = test_app(StubProvider::answering("ok"), None);

    let response = app.server.get("/anomaly/%20331523%20").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["transaction_id"], "331523");
    assert_eq!(body["risk_level"], "High");
}

#[tokio::test]
async fn test_unknown_anomaly_is_not_found_with_request_id() {
    let app = test_app(StubProvider::answering("ok"), None);

    let response = app.server.get("/anomaly/does-not-exist").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let echoed = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "NOT_FOUND");
    assert_eq!(body.message, "Transaction not found");
    assert_eq!(body.request_id.as_deref(), Some(echoed.as_str()));
}

#[tokio::test]
async fn test_caller_request_id_is_echoed() {
    let app = test_app(StubProvider::answering("ok"), None);
    let (name, value) = header("x-request-id", "audit-trace-42");

    let response = app.server.get("/no-such-route").add_header(name, value).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "audit-trace-42");
    let body: ErrorResponse = response.json();
    assert_eq!(body.request_id.as_deref(), Some("audit-trace-42"));
}

// =============================================================================
// Explain
// =============================================================================

#[tokio::test]
async fn test_explain_by_trimmed_id() {
    let provider = StubProvider::answering(EXPLANATION);
    let app = test_app(provider.clone(), None);

    let response = app
        .server
        .post("/explain")
        .json(&json!({ "transaction_id": "  331521 " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["transaction_id"], "331521");
    assert_eq!(body["risk_level"], "High");
    assert_eq!(body["possible_cause"], "Duplicate invoice");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_explain_inline_payload() {
    let app = test_app(StubProvider::answering(EXPLANATION), None);

    let response = app
        .server
        .post("/explain")
        .json(&json!({
            "transaction": {"transaction_id": "X-1", "amount": 10.0, "account": "9999"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["transaction_id"], "X-1");
}

#[tokio::test]
async fn test_explain_rejects_mismatched_ids() {
    let provider = StubProvider::answering(EXPLANATION);
    let app = test_app(provider.clone(), None);

    let response = app
        .server
        .post("/explain")
        .json(&json!({
            "transaction_id": "331521",
            "transaction": {"transaction_id": "331523", "amount": 10.0, "account": "4100"}
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "VALIDATION_ERROR");
    assert!(body.message.contains("does not match"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_explain_requires_id_or_payload() {
    let app = test_app(StubProvider::answering(EXPLANATION), None);

    for payload in [json!({}), json!({ "transaction_id": "   " })] {
        let response = app.server.post("/explain").json(&payload).await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert!(body.message.contains("Provide transaction_id"));
    }
}

#[tokio::test]
async fn test_explain_unknown_id_is_not_found() {
    let provider = StubProvider::answering(EXPLANATION);
    let app = test_app(provider.clone(), None);

    let response = app
        .server
        .post("/explain")
        .json(&json!({ "transaction_id": "331522" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_rate_limited_provider_is_bounded() {
    let provider = StubProvider::failing(LLMError::RateLimited {
        retry_after_seconds: None,
    });
    let app = test_app(provider.clone(), None);

    let response = app
        .server
        .post("/explain")
        .json(&json!({ "transaction_id": "331521" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "PROVIDER_ERROR");
    assert_eq!(body.message, "LLM provider request failed");
    assert!(body.request_id.is_some());

    assert_eq!(provider.calls(), 3);
    let snapshot = app.metrics.snapshot();
    assert_eq!(snapshot.providers["ollama"].calls, 3);
    assert_eq!(snapshot.providers["ollama"].retries, 2);
    assert_eq!(snapshot.providers["ollama"].failures, 1);
}

#[tokio::test]
async fn test_provider_details_stay_out_of_the_body() {
    let app = test_app(
        StubProvider::failing(LLMError::Unavailable {
            message: "connection refused to http://10.0.0.7:11434".to_string(),
        }),
        None,
    );

    let response = app
        .server
        .post("/explain")
        .json(&json!({ "transaction_id": "331521" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert!(!response.text().contains("10.0.0.7"));
}

// =============================================================================
// Audit report and chat
// =============================================================================

#[tokio::test]
async fn test_audit_report_bounds_context() {
    let app = test_app(StubProvider::answering("Two high-value postings need review."), None);

    let response = app
        .server
        .post("/audit-report")
        .json(&json!({ "max_transactions": 2 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["summary"], "Two high-value postings need review.");
    assert_eq!(body["total_flagged"], 3);
    assert_eq!(body["analyzed"], 2);

    let distribution = &body["risk_distribution"];
    let sum = ["high", "medium", "low", "unknown"]
        .iter()
        .map(|level| distribution[*level].as_u64().unwrap_or(0))
        .sum::<u64>();
    assert!(sum <= 2);
}

#[tokio::test]
async fn test_audit_report_rejects_out_of_range() {
    let app = test_app(StubProvider::answering("unused"), None);

    let response = app
        .server
        .post("/audit-report")
        .json(&json!({ "max_transactions": 0 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert!(body.message.contains("max_transactions"));
}

#[tokio::test]
async fn test_chat_answers_with_context_rows() {
    let app = test_app(StubProvider::answering("Assistant: Vendor 331523 stands out."), None);

    let response = app
        .server
        .post("/chat")
        .json(&json!({ "question": "  Which posting is largest?  ", "max_transactions": 10 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["answer"], "Vendor 331523 stands out.");
    assert_eq!(body["context_rows"], 3);
}

#[tokio::test]
async fn test_chat_rejects_blank_question() {
    let provider = StubProvider::answering("unused");
    let app = test_app(provider.clone(), None);

    let response = app.server.post("/chat").json(&json!({ "question": "   " })).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json();
    assert_eq!(body.code, "VALIDATION_ERROR");
    assert!(body.message.contains("question"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_llm_routes_never_send_raw_identifiers() {
    let provider = StubProvider::answering(EXPLANATION);
    let app = test_app(provider.clone(), None);

    let explain = app
        .server
        .post("/explain")
        .json(&json!({ "transaction_id": "331521" }))
        .await;
    assert_eq!(explain.status_code(), StatusCode::OK);

    let report = app
        .server
        .post("/audit-report")
        .json(&json!({ "max_transactions": 10 }))
        .await;
    assert_eq!(report.status_code(), StatusCode::OK);

    let chat = app
        .server
        .post("/chat")
        .json(&json!({
            "question": "Did cfo@corp.example approve the wire to GB29 NWBK 6016 1331 9268 19?",
            "max_transactions": 10
        }))
        .await;
    assert_eq!(chat.status_code(), StatusCode::OK);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 3);
    for prompt in &prompts {
        for raw in [
            "ap@vendor.example",
            "cfo@corp.example",
            "DE89370400440532013000",
            "GB29NWBK60161331926819",
            "GB29 NWBK 6016 1331 9268 19",
        ] {
            assert!(!prompt.contains(raw), "{raw} leaked into prompt: {prompt}");
        }
        assert!(prompt.contains("[REDACTED]"));
    }
}

// =============================================================================
// API key gate
// =============================================================================

#[tokio::test]
async fn test_api_key_gate() {
    let app = test_app(StubProvider::answering("ok"), Some("s3cret"));

    let missing = app.server.get("/anomalies").await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = missing.json();
    assert_eq!(body.code, "UNAUTHORIZED");

    let (name, value) = header("x-api-key", "wrong");
    let wrong = app.server.get("/anomalies").add_header(name, value).await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let (name, value) = header("x-api-key", "s3cret");
    let ok = app.server.get("/anomalies").add_header(name, value).await;
    assert_eq!(ok.status_code(), StatusCode::OK);

    let health = app.server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);

    let snapshot = app.metrics.snapshot();
    assert_eq!(snapshot.routes["GET /anomalies"].count, 3);
    assert_eq!(snapshot.routes["GET /anomalies"].errors, 2);
}

// =============================================================================
// Metrics and docs
// =============================================================================

#[tokio::test]
async fn test_request_counts_use_route_templates() {
    let app = test_app(StubProvider::answering("ok"), None);

    for _ in 0..4 {
        app.server.get("/anomalies").await;
    }
    app.server.get("/anomaly/331521").await;
    app.server.get("/anomaly/331523").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["routes"]["GET /anomalies"]["count"], 4);
    assert_eq!(body["routes"]["GET /anomaly/:transaction_id"]["count"], 2);
}

#[tokio::test]
async fn test_prometheus_exposition() {
    let app = test_app(StubProvider::answering("ok"), None);
    app.server.get("/health").await;

    let response = app.server.get("/metrics/prometheus").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let text = response.text();
    assert!(text.contains("# TYPE auditai_http_requests_total counter"));
    assert!(text.contains(r#"auditai_http_requests_total{method="GET",path="/health"} 1"#));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app(StubProvider::answering("ok"), None);

    let response = app.server.get("/openapi.json").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "AuditAI API");
    assert!(body["paths"]["/explain"].is_object());
    assert!(body["paths"]["/anomaly/{transaction_id}"].is_object());
}
