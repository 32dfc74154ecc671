//! AuditAI Server
//!
//! Forensic audit copilot backend. Loads the flagged-transaction dataset once,
//! connects to the configured LLM provider (Azure OpenAI or Ollama), and serves
//! the AuditAI REST API.
//!
//! # Usage
//!
//! ```bash
//! # Local Ollama with the default dataset path
//! auditai-server
//!
//! # Azure OpenAI
//! LLM_PROVIDER=azure AZURE_OPENAI_ENDPOINT=https://acme.openai.azure.com \
//!   AZURE_OPENAI_API_KEY=... AZURE_OPENAI_DEPLOYMENT=gpt-4o auditai-server
//!
//! # Config file plus nested environment overrides
//! AUDITAI__LLM__MAX_ATTEMPTS=5 auditai-server --config config/prod.toml
//! ```

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use auditai_api::{create_router, ApiConfig, AppState};
use auditai_ledger::DatasetStore;
use auditai_llm::{LLMRouter, LlmOrchestrator};
use auditai_metrics::MetricsRegistry;

use crate::config::{parse_origins, ServerConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// AuditAI Server - forensic audit copilot backend
#[derive(Parser, Debug)]
#[command(name = "auditai-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "AUDITAI_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "AUDITAI_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "AUDITAI_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AUDITAI_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "AUDITAI_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to the anomalies CSV
    #[arg(long, env = "ANOMALIES_CSV_PATH")]
    dataset: Option<String>,

    /// LLM provider (azure, ollama)
    #[arg(long, env = "LLM_PROVIDER")]
    provider: Option<String>,

    /// Azure OpenAI resource endpoint
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    azure_endpoint: Option<String>,

    /// Azure OpenAI API key
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    azure_api_key: Option<String>,

    /// Azure OpenAI API version
    #[arg(long, env = "AZURE_OPENAI_API_VERSION")]
    azure_api_version: Option<String>,

    /// Azure OpenAI deployment name
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    azure_deployment: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_BASE_URL")]
    ollama_url: Option<String>,

    /// Ollama model name
    #[arg(long, env = "OLLAMA_MODEL")]
    ollama_model: Option<String>,

    /// Static API key required on every route except /health
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "CORS_ORIGINS")]
    cors_origins: Option<String>,
}

impl Args {
    /// Apply CLI flags (and their flat environment variables) on top of the loaded config
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(dataset) = self.dataset {
            config.dataset.csv_path = dataset.into();
        }
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
        }
        if let Some(endpoint) = self.azure_endpoint {
            config.llm.azure.endpoint = endpoint;
        }
        if let Some(api_key) = self.azure_api_key {
            config.llm.azure.api_key = api_key;
        }
        if let Some(api_version) = self.azure_api_version {
            config.llm.azure.api_version = api_version;
        }
        if let Some(deployment) = self.azure_deployment {
            config.llm.azure.deployment = deployment;
        }
        if let Some(url) = self.ollama_url {
            config.llm.ollama.base_url = url;
        }
        if let Some(model) = self.ollama_model {
            config.llm.ollama.model = model;
        }
        if let Some(api_key) = self.api_key {
            config.api.api_key = Some(api_key);
        }
        if let Some(origins) = self.cors_origins {
            config.api.cors_origins = parse_origins(&origins);
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut server_config);

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting AuditAI server"
    );

    if let Err(e) = server_config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let state = Arc::new(build_state(&server_config)?);

    let api_config = ApiConfig {
        enable_cors: !server_config.api.cors_origins.is_empty(),
        cors_origins: server_config.api.cors_origins.clone(),
        enable_tracing: server_config.api.enable_tracing,
        max_body_size: server_config.api.max_body_size,
    };

    let app = create_router(state, api_config);

    let listener = server_config.server.bind().await?;

    tracing::info!(
        host = %server_config.server.host,
        port = server_config.server.port,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .try_init()?;
        }
    }

    Ok(())
}

/// Load the dataset and wire the provider, orchestrator and metrics together
fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let dataset = DatasetStore::load(&config.dataset.csv_path)?;
    if dataset.is_empty() {
        tracing::warn!(
            path = %config.dataset.csv_path.display(),
            "Dataset contains no flagged transactions"
        );
    }

    let router = LLMRouter::from_settings(&config.llm.provider_settings())?;
    let metrics = Arc::new(MetricsRegistry::new());

    let orchestrator = LlmOrchestrator::new(router.provider().clone(), metrics.clone())
        .with_retry_policy(config.llm.retry_policy())
        .with_redactor(config.redaction.redactor());

    tracing::info!(
        provider = %router.kind(),
        model = router.provider().model(),
        max_attempts = config.llm.max_attempts,
        anomalies = dataset.len(),
        api_key_required = config.api.api_key.is_some(),
        "Application state ready"
    );

    Ok(AppState::new(Arc::new(dataset), Arc::new(orchestrator), metrics)
        .with_api_key(config.api.api_key.clone()))
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for Ctrl+C or SIGTERM, then give in-flight requests a bounded grace period
async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    tracing::info!(
        timeout_secs = timeout.as_secs(),
        "Draining in-flight requests"
    );

    // Stop waiting on slow LLM calls once the grace period is over
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        tracing::warn!("Shutdown grace period elapsed, exiting");
        std::process::exit(0);
    });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["auditai-server", "--port", "8080", "--provider", "azure"]);
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.provider.as_deref(), Some("azure"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "auditai-server",
            "--dataset",
            "/data/flagged.csv",
            "--ollama-model",
            "mistral",
            "--cors-origins",
            "https://audit.example, https://ops.example",
            "--api-key",
            "k",
        ]);

        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.dataset.csv_path, std::path::PathBuf::from("/data/flagged.csv"));
        assert_eq!(config.llm.ollama.model, "mistral");
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.api.api_key.as_deref(), Some("k"));
        // Untouched values keep their defaults
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_build_state_with_ollama() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "transaction_id,amount,account,label").unwrap();
        writeln!(file, "A1,10.0,4000,global").unwrap();
        writeln!(file, "A2,12.0,4000,regular").unwrap();

        let mut config = ServerConfig::default();
        config.dataset.csv_path = file.path().to_path_buf();
        config.api.api_key = Some("  ".to_string());

        let state = build_state(&config).unwrap();
        assert_eq!(state.dataset.len(), 1);
        assert_eq!(state.provider_name(), "ollama");
        assert!(state.api_key.is_none());
    }

    #[test]
    fn test_build_state_uses_configured_markers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "transaction_id,amount,account,label,employee_id").unwrap();
        writeln!(file, "A1,10.0,4000,global,E-77").unwrap();

        let mut config = ServerConfig::default();
        config.dataset.csv_path = file.path().to_path_buf();
        config.redaction.sensitive_markers = vec!["employee".to_string()];

        let state = build_state(&config).unwrap();
        let redactor = state.orchestrator.redactor();
        assert!(redactor.is_sensitive_key("employee_id"));
        assert!(!redactor.is_sensitive_key("payee_name"));

        let redacted = redactor.redact(state.dataset.get_by_id("A1").unwrap());
        assert_eq!(redacted.metadata["employee_id"], "[REDACTED]");
    }

    #[test]
    fn test_build_state_rejects_incomplete_azure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "transaction_id,amount,account").unwrap();

        let mut config = ServerConfig::default();
        config.dataset.csv_path = file.path().to_path_buf();
        config.llm.provider = "azure".to_string();

        assert!(build_state(&config).is_err());
    }
}
