//! Server Configuration
//!
//! Layered configuration for the AuditAI server: config files, then
//! `AUDITAI__SECTION__KEY` environment variables, then CLI flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

use auditai_ledger::{Redactor, DEFAULT_SENSITIVE_MARKERS};
use auditai_llm::{AzureOpenAIConfig, OllamaConfig, ProviderKind, ProviderSettings, RetryPolicy};

/// Startup configuration problems. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Unknown LLM provider '{0}' (expected 'azure' or 'ollama')")]
    UnknownProvider(String),

    #[error("Azure OpenAI provider selected but missing: {0}")]
    MissingAzureCredentials(String),

    #[error("Dataset not found at {0}")]
    DatasetMissing(PathBuf),

    #[error("llm.max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub dataset: DatasetSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub redaction: RedactionSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    /// Bind the listener. Hostnames (`localhost`) and bare IPv6 hosts (`::1`) are resolved.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind((self.host.as_str(), self.port)).await
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Dataset location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSettings {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

/// LLM provider and retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// `azure` or `ollama`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Per-request provider timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Total provider calls per request, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default)]
    pub azure: AzureSettings,

    #[serde(default)]
    pub ollama: OllamaSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout_secs: default_llm_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            azure: AzureSettings::default(),
            ollama: OllamaSettings::default(),
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.initial_backoff_ms))
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            provider: self.provider.trim().to_string(),
            azure: AzureOpenAIConfig {
                endpoint: self.azure.endpoint.clone(),
                api_key: self.azure.api_key.clone(),
                api_version: self.azure.api_version.clone(),
                deployment: self.azure.deployment.clone(),
                timeout: self.timeout(),
            },
            ollama: OllamaConfig {
                base_url: self.ollama.base_url.clone(),
                model: self.ollama.model.clone(),
                timeout: self.timeout(),
            },
            timeout: self.timeout(),
        }
    }
}

/// Azure OpenAI credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSettings {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_azure_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub deployment: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: default_azure_api_version(),
            deployment: String::new(),
        }
    }
}

/// Local Ollama server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

/// API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Static key for every route except `/health`; unset disables the gate
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enable_tracing: bool,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            api_key: None,
            enable_tracing: true,
            max_body_size: default_max_body_size(),
        }
    }
}

/// Prompt redaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionSettings {
    /// Metadata columns whose name contains any of these (case-insensitive) are masked
    #[serde(default = "default_sensitive_markers")]
    pub sensitive_markers: Vec<String>,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            sensitive_markers: default_sensitive_markers(),
        }
    }
}

impl RedactionSettings {
    pub fn redactor(&self) -> Redactor {
        Redactor::with_markers(&self.sensitive_markers)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/anomalies.csv")
}

fn default_provider() -> String {
    ProviderKind::Ollama.to_string()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_azure_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_sensitive_markers() -> Vec<String> {
    DEFAULT_SENSITIVE_MARKERS.iter().map(|m| m.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from config files and the environment
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AUDITAI")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = ProviderKind::from_str(self.llm.provider.trim())
            .ok_or_else(|| ConfigError::UnknownProvider(self.llm.provider.clone()))?;

        if provider == ProviderKind::Azure {
            let azure = &self.llm.azure;
            let missing: Vec<&str> = [
                ("AZURE_OPENAI_ENDPOINT", &azure.endpoint),
                ("AZURE_OPENAI_API_KEY", &azure.api_key),
                ("AZURE_OPENAI_DEPLOYMENT", &azure.deployment),
            ]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();

            if !missing.is_empty() {
                return Err(ConfigError::MissingAzureCredentials(missing.join(", ")));
            }
        }

        if self.llm.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        if !self.dataset.csv_path.is_file() {
            return Err(ConfigError::DatasetMissing(self.dataset.csv_path.clone()));
        }

        Ok(())
    }
}
