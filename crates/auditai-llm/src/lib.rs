//! AuditAI LLM - Provider Abstraction and Audit Copilot
//!
//! This crate puts two very different LLM backends behind one interface:
//!
//! ## Cloud Provider
//! - Azure OpenAI chat completions (deployment-addressed)
//!
//! ## Local Provider (no API keys required)
//! - Ollama: `http://localhost:11434`
//!
//! On top of the [`LLMProvider`] trait sits the [`LlmOrchestrator`], which
//! builds redacted prompts, retries rate-limited and timed-out calls a bounded
//! number of times, normalizes the returned text, and keeps the LLM counters
//! in the shared metrics registry up to date.
//!
//! ## Key Design Principles
//!
//! 1. No raw sensitive field ever reaches a prompt string
//! 2. The orchestrator never knows which provider it is talking to
//! 3. Retries are bounded and only happen for rate limits and timeouts

pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod router;
pub mod types;

pub use normalize::*;
pub use orchestrator::*;
pub use prompts::*;
pub use providers::*;
pub use router::*;
pub use types::*;
