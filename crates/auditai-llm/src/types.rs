//! Common types for LLM interactions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LLMError {
    #[error("Rate limited by provider")]
    RateLimited { retry_after_seconds: Option<u64> },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

pub type Result<T> = std::result::Result<T, LLMError>;

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    Timeout,
    Unavailable,
    InvalidResponse,
    Configuration,
}

impl LLMError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::RateLimited { .. } => ProviderErrorKind::RateLimited,
            Self::Timeout { .. } => ProviderErrorKind::Timeout,
            Self::Unavailable { .. } => ProviderErrorKind::Unavailable,
            Self::InvalidResponse { .. } => ProviderErrorKind::InvalidResponse,
            Self::ConfigurationError { .. } => ProviderErrorKind::Configuration,
        }
    }

    /// Only rate limits and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout { .. })
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Provider-agnostic completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Temperature (0.0-2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether to request JSON output
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system: None,
            messages,
            temperature: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Every piece of text that will be sent to the provider
    pub fn prompt_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system {
            parts.push(system);
        }
        parts.extend(self.messages.iter().map(|m| m.content.as_str()));
        parts.join("\n\n")
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw response from a provider, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated content
    pub content: String,
    /// Token usage
    #[serde(default)]
    pub usage: TokenUsage,
    /// Which model was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
            model: None,
        }
    }
}

/// Provider kind, selected once by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Azure OpenAI chat completions
    Azure,
    /// Ollama local LLM
    Ollama,
}

impl ProviderKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "azure" | "azure_openai" | "azure-openai" => Some(Self::Azure),
            "ollama" | "local" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(ProviderKind::from_str("azure"), Some(ProviderKind::Azure));
        assert_eq!(ProviderKind::from_str(" Ollama "), Some(ProviderKind::Ollama));
        assert_eq!(ProviderKind::from_str("openai"), None);
        assert_eq!(ProviderKind::Azure.to_string(), "azure");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(LLMError::RateLimited { retry_after_seconds: None }.is_retryable());
        assert!(LLMError::Timeout { message: "t".into() }.is_retryable());
        assert!(!LLMError::Unavailable { message: "u".into() }.is_retryable());
        assert!(!LLMError::invalid_response("bad").is_retryable());
        assert_eq!(
            LLMError::configuration("x").kind(),
            ProviderErrorKind::Configuration
        );
    }

    #[test]
    fn test_prompt_text_includes_system_and_messages() {
        let request = CompletionRequest::new(vec![Message::user("question")])
            .with_system("rules");
        assert_eq!(request.prompt_text(), "rules\n\nquestion");
    }
}
