//! LLM Provider implementations

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::*;

/// Default per-request timeout for provider calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Human readable provider name
    fn name(&self) -> &'static str;

    /// Get the provider kind
    fn kind(&self) -> ProviderKind;

    /// Model or deployment this provider talks to
    fn model(&self) -> &str;

    /// Complete a conversation. Every failure is mapped onto an [`LLMError`]
    /// kind so callers can decide whether to retry.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

// ============================================================================
// Shared HTTP error mapping
// ============================================================================

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LLMError::configuration(format!("failed to build HTTP client: {}", e)))
}

/// Map a transport-level failure (no HTTP status available)
pub(crate) fn map_transport_error(err: reqwest::Error) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout {
            message: err.to_string(),
        }
    } else {
        LLMError::Unavailable {
            message: err.to_string(),
        }
    }
}

/// Map a non-success HTTP status onto an error kind
pub(crate) fn map_status(status: StatusCode, retry_after_seconds: Option<u64>, body: &str) -> LLMError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    match status {
        StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimited { retry_after_seconds },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => LLMError::Timeout { message },
        s if s.is_server_error() => LLMError::Unavailable { message },
        _ => LLMError::InvalidResponse { message },
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Check the status and decode the body of a provider response
async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let retry_after_seconds = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(map_status(status, retry_after_seconds, &body));
    }

    let bytes = response.bytes().await.map_err(map_transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| LLMError::InvalidResponse {
        message: format!("malformed provider payload: {}", e),
    })
}

// ============================================================================
// Azure OpenAI Provider (Cloud)
// ============================================================================

/// Configuration for the Azure OpenAI provider
#[derive(Debug, Clone)]
pub struct AzureOpenAIConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    pub timeout: Duration,
}

impl Default for AzureOpenAIConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "2024-02-15-preview".to_string(),
            deployment: String::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl AzureOpenAIConfig {
    /// Endpoint, key and deployment are all required
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("endpoint", &self.endpoint),
            ("api_key", &self.api_key),
            ("deployment", &self.deployment),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LLMError::configuration(format!(
                "Azure OpenAI is missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

/// Azure OpenAI chat completions provider
pub struct AzureOpenAIProvider {
    config: AzureOpenAIConfig,
    client: reqwest::Client,
}

impl AzureOpenAIProvider {
    pub fn new(config: AzureOpenAIConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

#[derive(Serialize)]
struct AzureChatRequest {
    messages: Vec<AzureChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct AzureChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AzureChatResponse {
    #[serde(default)]
    choices: Vec<AzureChatChoice>,
    #[serde(default)]
    usage: Option<AzureUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct AzureChatChoice {
    message: AzureReplyMessage,
}

#[derive(Deserialize)]
struct AzureReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct AzureUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LLMProvider for AzureOpenAIProvider {
    fn name(&self) -> &'static str {
        "Azure OpenAI"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    fn model(&self) -> &str {
        &self.config.deployment
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(AzureChatMessage {
                role: MessageRole::System.as_str(),
                content: system,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| AzureChatMessage {
            role: m.role.as_str(),
            content: m.content,
        }));

        let chat_request = AzureChatRequest {
            messages,
            temperature: request.temperature,
            response_format: request
                .json_mode
                .then(|| serde_json::json!({"type": "json_object"})),
        };

        let response = self
            .client
            .post(self.config.chat_completions_url())
            .header("api-key", &self.config.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let chat_response: AzureChatResponse = decode_response(response).await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::invalid_response("response contained no choices"))?
            .message
            .content
            .unwrap_or_default();

        let usage = chat_response.usage.unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            model: chat_response
                .model
                .or_else(|| Some(self.config.deployment.clone())),
        })
    }
}

// ============================================================================
// Ollama Provider (Local)
// ============================================================================

/// Configuration for Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Ollama local LLM provider
pub struct OllamaProvider {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() || config.model.trim().is_empty() {
            return Err(LLMError::configuration(
                "Ollama requires both a base URL and a model name",
            ));
        }
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        // The system prompt travels in its own field
        let prompt = request
            .messages
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n\n");

        let ollama_request = OllamaRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            system: request.system,
            format: request.json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let ollama_response: OllamaResponse = decode_response(response).await?;

        Ok(CompletionResponse {
            content: ollama_response.response,
            usage: TokenUsage {
                prompt_tokens: ollama_response.prompt_eval_count,
                completion_tokens: ollama_response.eval_count,
                total_tokens: ollama_response.prompt_eval_count + ollama_response.eval_count,
            },
            model: ollama_response
                .model
                .or_else(|| Some(self.config.model.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            map_status(StatusCode::TOO_MANY_REQUESTS, Some(7), ""),
            LLMError::RateLimited { retry_after_seconds: Some(7) }
        );
        assert_eq!(
            map_status(StatusCode::GATEWAY_TIMEOUT, None, "").kind(),
            ProviderErrorKind::Timeout
        );
        assert_eq!(
            map_status(StatusCode::SERVICE_UNAVAILABLE, None, "down").kind(),
            ProviderErrorKind::Unavailable
        );
        assert_eq!(
            map_status(StatusCode::BAD_REQUEST, None, "bad").kind(),
            ProviderErrorKind::InvalidResponse
        );
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(12));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_azure_url_and_validation() {
        let config = AzureOpenAIConfig {
            endpoint: "https://audit.openai.azure.com/".to_string(),
            api_key: "key".to_string(),
            deployment: "gpt-4o".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.chat_completions_url(),
            "https://audit.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
        assert!(config.validate().is_ok());

        let err = AzureOpenAIConfig::default().validate().unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Configuration);
        assert!(err.to_string().contains("endpoint, api_key, deployment"));
    }

    #[test]
    fn test_ollama_requires_model() {
        let config = OllamaConfig {
            model: " ".to_string(),
            ..Default::default()
        };
        assert!(OllamaProvider::new(config).is_err());
        assert!(OllamaProvider::new(OllamaConfig::default()).is_ok());
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ab", 10), "ab");
    }
}
