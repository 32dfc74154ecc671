//! Common ledger types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Errors raised while loading or querying the dataset
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Dataset unavailable at {path}: {message}")]
    Config { path: String, message: String },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Transaction not found: {0}")]
    NotFound(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// A flagged ledger transaction
///
/// Core fields are mapped from well-known dataset columns; every other column
/// is kept verbatim in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Document / transaction identifier
    pub transaction_id: String,
    /// Posted amount
    pub amount: f64,
    /// General-ledger account code
    pub account: String,
    /// Upstream anomaly score (0.0-1.0)
    #[serde(default)]
    pub anomaly_score: f64,
    /// Risk bucket (High, Medium, Low, Unknown)
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    /// Free-text posting description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remaining dataset columns
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_risk_level() -> String {
    "Unknown".to_string()
}

impl Transaction {
    pub fn new(transaction_id: impl Into<String>, amount: f64, account: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            amount,
            account: account.into(),
            anomaly_score: 0.0,
            risk_level: default_risk_level(),
            description: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_risk(mut self, risk_level: impl Into<String>, anomaly_score: f64) -> Self {
        self.risk_level = risk_level.into();
        self.anomaly_score = anomaly_score;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
