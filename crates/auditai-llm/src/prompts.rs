//! Prompt construction for the audit copilot tasks.
//!
//! Every builder redacts its input first, so callers cannot produce a prompt
//! from raw transaction data.

use auditai_ledger::{scrub_text, Redactor, Transaction};

use crate::types::{CompletionRequest, Message};

/// Forensic-audit system prompt used for explanations
pub const EXPLAIN_SYSTEM_PROMPT: &str = r#"You are a forensic audit copilot.
Return ONLY valid JSON with this schema:
{
  "explanation": "string",
  "risk_level": "Low|Medium|High",
  "possible_cause": "string",
  "recommended_action": "string"
}
Keep recommendations practical and compliance-focused."#;

pub const REPORT_SYSTEM_PROMPT: &str = "You are a forensic audit copilot writing for an audit committee. \
Summarize the flagged ledger transactions you are given: recurring patterns, the most material items, \
likely control weaknesses and prioritized next steps. Use plain prose and short paragraphs.";

pub const CHAT_SYSTEM_PROMPT: &str = "You are a forensic audit copilot. Answer the auditor's question \
using only the flagged ledger transactions provided. If the rows do not contain the answer, say so \
plainly instead of guessing. Cite transaction ids when you refer to specific rows.";

const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Which copilot task a prompt is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Explain,
    Report,
    Chat,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Report => "report",
            Self::Chat => "chat",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Explain => EXPLAIN_SYSTEM_PROMPT,
            Self::Report => REPORT_SYSTEM_PROMPT,
            Self::Chat => CHAT_SYSTEM_PROMPT,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds provider-agnostic completion requests from redacted transactions
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    redactor: Redactor,
}

impl PromptBuilder {
    pub fn new(redactor: Redactor) -> Self {
        Self { redactor }
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn explain(&self, transaction: &Transaction) -> CompletionRequest {
        let user = format!(
            "Analyze this flagged ledger transaction and provide concise audit guidance.\n\
             Transaction JSON: {}",
            self.to_json_line(transaction)
        );
        request(TaskKind::Explain, user).with_json_mode()
    }

    pub fn report(&self, transactions: &[Transaction]) -> CompletionRequest {
        let user = format!(
            "Write an audit summary of the following {} flagged transactions \
             (one JSON object per line):\n{}",
            transactions.len(),
            self.rows_block(transactions)
        );
        request(TaskKind::Report, user)
    }

    pub fn chat(&self, question: &str, transactions: &[Transaction]) -> CompletionRequest {
        let user = format!(
            "Question: {}\n\nFlagged transactions ({} rows, one JSON object per line):\n{}",
            scrub_text(question.trim()),
            transactions.len(),
            self.rows_block(transactions)
        );
        request(TaskKind::Chat, user)
    }

    fn rows_block(&self, transactions: &[Transaction]) -> String {
        if transactions.is_empty() {
            return "(no flagged transactions)".to_string();
        }
        transactions
            .iter()
            .map(|tx| self.to_json_line(tx))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn to_json_line(&self, transaction: &Transaction) -> String {
        let redacted = self.redactor.redact(transaction);
        // Serializing plain data into a String cannot fail
        serde_json::to_string(&redacted).unwrap_or_default()
    }
}

fn request(task: TaskKind, user: String) -> CompletionRequest {
    CompletionRequest::new(vec![Message::user(user)])
        .with_system(task.system_prompt())
        .with_temperature(DEFAULT_TEMPERATURE)
}
