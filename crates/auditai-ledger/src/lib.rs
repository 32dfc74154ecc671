//! AuditAI Ledger - Flagged Transaction Dataset
//!
//! This crate owns everything the service knows about the ledger itself:
//!
//! - [`Transaction`]: one row of the accounting dataset
//! - [`DatasetStore`]: the CSV loaded once at startup, filtered to anomalies
//! - [`Redactor`]: masks sensitive fields before a row is embedded in a prompt
//! - [`RiskDistribution`]: aggregate counts by risk level
//!
//! The store is read-only after load, so it can be shared behind an `Arc`
//! without any locking.

pub mod redact;
pub mod risk;
pub mod store;
pub mod types;

pub use redact::*;
pub use risk::*;
pub use store::*;
pub use types::*;
