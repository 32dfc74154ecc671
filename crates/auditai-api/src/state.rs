//! Application State
//!
//! Shared state for all API handlers.

use std::sync::Arc;

use auditai_ledger::DatasetStore;
use auditai_llm::LlmOrchestrator;
use auditai_metrics::MetricsRegistry;

/// Shared application state
pub struct AppState {
    /// Flagged transactions, loaded once at startup
    pub dataset: Arc<DatasetStore>,
    /// LLM orchestrator over the configured provider
    pub orchestrator: Arc<LlmOrchestrator>,
    /// Request and LLM counters (same instance the orchestrator records into)
    pub metrics: Arc<MetricsRegistry>,
    /// Static key required on every route except `/health`
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(
        dataset: Arc<DatasetStore>,
        orchestrator: Arc<LlmOrchestrator>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            dataset,
            orchestrator,
            metrics,
            api_key: None,
        }
    }

    /// Blank keys disable the gate
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.orchestrator.provider_name()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("anomalies", &self.dataset.len())
            .field("provider", &self.provider_name())
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}
