//! Audit copilot DTOs (explain, audit report, chat)

use auditai_ledger::{RiskDistribution, Transaction};
use auditai_llm::Explanation;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

pub const MAX_CONTEXT_TRANSACTIONS: usize = 500;
pub const MAX_QUESTION_CHARS: usize = 4000;

// =============================================================================
// Explain
// =============================================================================

/// Explain one flagged transaction, by id or by full payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ExplainRequest {
    /// Dataset transaction id (surrounding whitespace is ignored)
    #[validate(length(max = 128, message = "must be at most 128 characters"))]
    pub transaction_id: Option<String>,
    /// Inline transaction, used instead of a dataset lookup
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExplainResponse {
    pub transaction_id: String,
    pub explanation: String,
    /// Low, Medium or High
    pub risk_level: String,
    pub possible_cause: String,
    pub recommended_action: String,
}

impl ExplainResponse {
    pub fn new(transaction_id: impl Into<String>, explanation: Explanation) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            explanation: explanation.explanation,
            risk_level: explanation.risk_level,
            possible_cause: explanation.possible_cause,
            recommended_action: explanation.recommended_action,
        }
    }
}

// =============================================================================
// Audit report
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AuditReportRequest {
    /// How many flagged transactions to summarize (1-500)
    #[serde(default = "default_report_transactions")]
    #[validate(range(min = 1, max = 500, message = "must be between 1 and 500"))]
    pub max_transactions: usize,
}

fn default_report_transactions() -> usize {
    50
}

impl Default for AuditReportRequest {
    fn default() -> Self {
        Self {
            max_transactions: default_report_transactions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditReportResponse {
    pub summary: String,
    /// Flagged transactions in the whole dataset
    pub total_flagged: usize,
    /// Transactions actually sent to the model
    pub analyzed: usize,
    /// Risk levels of the analyzed transactions
    pub risk_distribution: RiskDistribution,
}

// =============================================================================
// Chat
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Free-text question, 1-4000 characters after trimming
    pub question: String,
    /// How many flagged transactions to ground the answer on (1-500)
    #[serde(default = "default_chat_transactions")]
    pub max_transactions: usize,
}

fn default_chat_transactions() -> usize {
    30
}

impl ChatRequest {
    pub fn trimmed_question(&self) -> &str {
        self.question.trim()
    }
}

// Hand-written so the length rule applies to the trimmed question
impl Validate for ChatRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let length = self.trimmed_question().chars().count();
        if length == 0 || length > MAX_QUESTION_CHARS {
            let mut error = ValidationError::new("length");
            error.message = Some("must be between 1 and 4000 characters".into());
            errors.add("question", error);
        }

        if !(1..=MAX_CONTEXT_TRANSACTIONS).contains(&self.max_transactions) {
            let mut error = ValidationError::new("range");
            error.message = Some("must be between 1 and 500".into());
            errors.add("max_transactions", error);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub answer: String,
    /// Transactions supplied to the model as context
    pub context_rows: usize,
}
