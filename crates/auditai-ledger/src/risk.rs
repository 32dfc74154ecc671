//! Risk levels and their aggregate distribution

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::Transaction;

/// Normalized risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl RiskLevel {
    /// Parse a free-form risk string, case-insensitively
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Risk implied by an upstream dataset label (`global`, `local`, `regular`)
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "global" => Self::High,
            "local" => Self::Medium,
            "regular" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Anomaly score implied by an upstream dataset label
    pub fn score_for_label(label: &str) -> f64 {
        match label.trim().to_ascii_lowercase().as_str() {
            "global" => 0.95,
            "local" => 0.75,
            "regular" => 0.05,
            _ => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction counts grouped by risk level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

impl RiskDistribution {
    pub fn from_transactions<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut distribution = Self::default();
        for tx in transactions {
            distribution.record(RiskLevel::parse(&tx.risk_level));
        }
        distribution
    }

    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
            RiskLevel::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low + self.unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(RiskLevel::parse(" HIGH "), RiskLevel::High);
        assert_eq!(RiskLevel::parse("medium"), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse("critical"), RiskLevel::Unknown);
    }

    #[test]
    fn test_distribution_counts_every_row_once() {
        let rows = vec![
            Transaction::new("1", 1.0, "4000").with_risk("High", 0.9),
            Transaction::new("2", 1.0, "4000").with_risk("high", 0.9),
            Transaction::new("3", 1.0, "4000").with_risk("Low", 0.1),
            Transaction::new("4", 1.0, "4000").with_risk("??", 0.1),
        ];

        let distribution = RiskDistribution::from_transactions(&rows);
        assert_eq!(distribution.high, 2);
        assert_eq!(distribution.medium, 0);
        assert_eq!(distribution.low, 1);
        assert_eq!(distribution.unknown, 1);
        assert_eq!(distribution.total(), rows.len());
    }
}
