//! Anomaly listing DTOs

use auditai_ledger::Transaction;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Every flagged transaction, in dataset order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnomalyListResponse {
    /// Number of flagged transactions
    pub total: usize,
    pub items: Vec<Transaction>,
}

impl From<&[Transaction]> for AnomalyListResponse {
    fn from(items: &[Transaction]) -> Self {
        Self {
            total: items.len(),
            items: items.to_vec(),
        }
    }
}
