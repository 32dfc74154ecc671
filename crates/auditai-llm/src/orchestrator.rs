//! LLM Orchestrator - redaction, bounded retry and normalization around a provider
//!
//! Each request walks a small state machine:
//!
//! ```text
//! Pending -> Attempting -> Success
//!                |
//!                +-> Retrying -> Attempting
//!                +-> Failed
//! ```
//!
//! Only `RateLimited` and `Timeout` failures move to `Retrying`; everything
//! else fails immediately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use auditai_ledger::{Redactor, Transaction};
use auditai_metrics::MetricsRegistry;
use serde::Serialize;
use thiserror::Error;

use crate::normalize::{normalize_text, parse_explanation, Explanation};
use crate::prompts::{PromptBuilder, TaskKind};
use crate::providers::LLMProvider;
use crate::types::{CompletionRequest, LLMError, ProviderErrorKind};

/// Upper bound on any single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 2,
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            ..Default::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// A provider-supplied `Retry-After` wins when it is longer than the
    /// computed backoff. The result never exceeds `max_backoff`.
    pub fn delay_after(&self, attempt: u32, error: &LLMError) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_multiplier.max(1).saturating_pow(exponent);
        let mut delay = self.initial_backoff.saturating_mul(factor);

        if let LLMError::RateLimited {
            retry_after_seconds: Some(seconds),
        } = error
        {
            delay = delay.max(Duration::from_secs(*seconds));
        }

        delay.min(self.max_backoff)
    }
}

/// Lifecycle of one orchestrated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Attempting,
    Retrying,
    Success,
    Failed,
}

/// Normalized provider output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResponse {
    pub text: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub latency_ms: u64,
    pub attempts: u32,
    pub retries: u32,
}

/// A request that could not be completed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("LLM request failed after {attempts} attempt(s): {source}")]
pub struct OrchestratorError {
    pub provider: String,
    pub attempts: u32,
    pub retries: u32,
    #[source]
    pub source: LLMError,
}

impl OrchestratorError {
    pub fn kind(&self) -> ProviderErrorKind {
        self.source.kind()
    }

    /// True when the last failure was retryable, i.e. the retry budget ran out
    pub fn retries_exhausted(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Audit copilot over a single configured provider
pub struct LlmOrchestrator {
    provider: Arc<dyn LLMProvider>,
    prompts: PromptBuilder,
    retry: RetryPolicy,
    metrics: Arc<MetricsRegistry>,
}

impl LlmOrchestrator {
    pub fn new(provider: Arc<dyn LLMProvider>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            provider,
            prompts: PromptBuilder::default(),
            retry: RetryPolicy::default(),
            metrics,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.prompts = PromptBuilder::new(redactor);
        self
    }

    /// Provider label used in metrics and the health response
    pub fn provider_name(&self) -> &'static str {
        self.provider.kind().as_str()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn redactor(&self) -> &Redactor {
        self.prompts.redactor()
    }

    // ========================================================================
    // Copilot tasks
    // ========================================================================

    pub async fn explain(&self, transaction: &Transaction) -> Result<Explanation, OrchestratorError> {
        let request = self.prompts.explain(transaction);
        let response = self.generate(TaskKind::Explain, request).await?;

        parse_explanation(&response.text).map_err(|source| {
            self.fail(TaskKind::Explain, response.attempts, response.retries, source)
        })
    }

    pub async fn audit_report(&self, transactions: &[Transaction]) -> Result<String, OrchestratorError> {
        let request = self.prompts.report(transactions);
        Ok(self.generate(TaskKind::Report, request).await?.text)
    }

    pub async fn chat(
        &self,
        question: &str,
        transactions: &[Transaction],
    ) -> Result<String, OrchestratorError> {
        let request = self.prompts.chat(question, transactions);
        Ok(self.generate(TaskKind::Chat, request).await?.text)
    }

    // ========================================================================
    // Retry loop
    // ========================================================================

    /// Send an already-built request through the retry loop.
    ///
    /// The request reaches the provider as-is; prompts containing transaction
    /// data should come from the task methods above.
    pub async fn generate(
        &self,
        task: TaskKind,
        request: CompletionRequest,
    ) -> Result<ProviderResponse, OrchestratorError> {
        let provider = self.provider_name();
        let max_attempts = self.retry.max_attempts.max(1);
        let started = Instant::now();
        let mut state = CallState::Pending;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            state = self.transition(task, state, CallState::Attempting, attempt);
            self.metrics.record_llm_call(provider);

            match self.provider.complete(request.clone()).await {
                Ok(response) => {
                    let retries = attempt - 1;
                    let text = normalize_text(&response.content);
                    if text.is_empty() {
                        return Err(self.fail(
                            task,
                            attempt,
                            retries,
                            LLMError::invalid_response("provider returned an empty completion"),
                        ));
                    }

                    self.transition(task, state, CallState::Success, attempt);
                    let latency_ms = started.elapsed().as_millis() as u64;
                    tracing::info!(
                        task = %task,
                        provider,
                        attempts = attempt,
                        retries,
                        latency_ms,
                        "LLM request completed"
                    );

                    return Ok(ProviderResponse {
                        text,
                        provider: provider.to_string(),
                        model: response.model,
                        latency_ms,
                        attempts: attempt,
                        retries,
                    });
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt, &error);
                    tracing::warn!(
                        task = %task,
                        provider,
                        attempt,
                        max_attempts,
                        error_kind = ?error.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "Retryable LLM failure, backing off"
                    );
                    self.metrics.record_llm_retry(provider);
                    state = self.transition(task, state, CallState::Retrying, attempt);
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(self.fail(task, attempt, attempt - 1, error));
                }
            }
        }
    }

    fn fail(&self, task: TaskKind, attempts: u32, retries: u32, source: LLMError) -> OrchestratorError {
        let provider = self.provider_name();
        self.metrics.record_llm_failure(provider);
        tracing::debug!(task = %task, state = ?CallState::Failed, attempt = attempts, "LLM call state");
        tracing::error!(
            task = %task,
            provider,
            attempts,
            retries,
            error_kind = ?source.kind(),
            error = %source,
            "LLM request failed"
        );
        OrchestratorError {
            provider: provider.to_string(),
            attempts,
            retries,
            source,
        }
    }

    fn transition(&self, task: TaskKind, from: CallState, to: CallState, attempt: u32) -> CallState {
        tracing::debug!(task = %task, from = ?from, to = ?to, attempt, "LLM call state");
        to
    }
}

impl std::fmt::Debug for LlmOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmOrchestrator")
            .field("provider", &self.provider.name())
            .field("retry", &self.retry)
            .finish()
    }
}
