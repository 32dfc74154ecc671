//! LLM Router - Selects the configured provider once at startup

use std::sync::Arc;
use std::time::Duration;

use crate::providers::*;
use crate::types::*;

/// Everything needed to build a provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// `azure` or `ollama`
    pub provider: String,
    pub azure: AzureOpenAIConfig,
    pub ollama: OllamaConfig,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama.to_string(),
            azure: AzureOpenAIConfig::default(),
            ollama: OllamaConfig::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Build the configured provider as a trait object
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn LLMProvider>> {
    LLMRouter::from_settings(settings).map(|router| router.provider)
}

/// Holds the single provider chosen by configuration.
///
/// There is no silent fallback: an unknown provider name or incomplete
/// credentials is a configuration error and the service refuses to start.
#[derive(Clone)]
pub struct LLMRouter {
    provider: Arc<dyn LLMProvider>,
    kind: ProviderKind,
}

impl LLMRouter {
    /// Create a router around an already-built provider
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let kind = provider.kind();
        Self { provider, kind }
    }

    /// Create a router from configuration
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let kind = ProviderKind::from_str(&settings.provider).ok_or_else(|| {
            LLMError::configuration(format!(
                "unknown LLM provider '{}' (expected 'azure' or 'ollama')",
                settings.provider
            ))
        })?;

        LLMRouterBuilder::new()
            .kind(kind)
            .azure(settings.azure.clone())
            .ollama(settings.ollama.clone())
            .timeout(settings.timeout)
            .build()
    }

    /// Get the current provider
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Get the provider kind
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }
}

impl std::fmt::Debug for LLMRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMRouter")
            .field("kind", &self.kind)
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .finish()
    }
}

/// Builder for LLM router with explicit configuration
#[derive(Debug, Default)]
pub struct LLMRouterBuilder {
    kind: Option<ProviderKind>,
    azure_config: Option<AzureOpenAIConfig>,
    ollama_config: Option<OllamaConfig>,
    timeout: Option<Duration>,
}

impl LLMRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ProviderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn azure(mut self, config: AzureOpenAIConfig) -> Self {
        self.azure_config = Some(config);
        self
    }

    pub fn ollama(mut self, config: OllamaConfig) -> Self {
        self.ollama_config = Some(config);
        self
    }

    /// Override the per-request timeout of whichever provider is built
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<LLMRouter> {
        let kind = self
            .kind
            .ok_or_else(|| LLMError::configuration("no LLM provider selected"))?;

        let provider: Arc<dyn LLMProvider> = match kind {
            ProviderKind::Azure => {
                let mut config = self.azure_config.ok_or_else(|| {
                    LLMError::configuration("Azure OpenAI selected but not configured")
                })?;
                if let Some(timeout) = self.timeout {
                    config.timeout = timeout;
                }
                Arc::new(AzureOpenAIProvider::new(config)?)
            }
            ProviderKind::Ollama => {
                let mut config = self.ollama_config.unwrap_or_default();
                if let Some(timeout) = self.timeout {
                    config.timeout = timeout;
                }
                Arc::new(OllamaProvider::new(config)?)
            }
        };

        tracing::info!(
            provider = %kind,
            model = provider.model(),
            "LLM provider configured"
        );

        Ok(LLMRouter { provider, kind })
    }
}
