//! Redaction Filter
//!
//! Every transaction passes through a [`Redactor`] before any prompt text is
//! built from it. Two passes are applied:
//!
//! 1. Metadata entries whose key names a sensitive field are masked outright.
//! 2. Remaining free text is scrubbed of e-mail addresses and IBAN-shaped
//!    tokens.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::types::Transaction;

/// Replacement written in place of any sensitive value
pub const REDACTION_TOKEN: &str = "[REDACTED]";

/// Key fragments that mark a metadata column as sensitive
pub const DEFAULT_SENSITIVE_MARKERS: &[&str] = &[
    "email",
    "iban",
    "ssn",
    "tax_id",
    "taxid",
    "phone",
    "card",
    "passport",
    "swift",
    "bic",
    "routing",
    "bank_account",
    "account_number",
    "personal",
    "name",
    "address",
    "dob",
    "birth",
];

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+").expect("valid e-mail pattern")
});

// Country code, check digits, then 11-30 alphanumerics, optionally printed in groups of four
static IBAN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z]{2}[0-9]{2}(?: ?[A-Z0-9]{4}){2,7}(?: ?[A-Z0-9]{1,4})?\b").expect("valid IBAN pattern")
});

/// Masks sensitive transaction fields
#[derive(Debug, Clone)]
pub struct Redactor {
    markers: Vec<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::with_markers(DEFAULT_SENSITIVE_MARKERS.iter().copied())
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_ascii_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Whether a metadata key names a sensitive field
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.markers.iter().any(|marker| key.contains(marker.as_str()))
    }

    /// Return a copy of `tx` that is safe to embed in a prompt
    pub fn redact(&self, tx: &Transaction) -> Transaction {
        let mut redacted = tx.clone();

        redacted.description = tx.description.as_deref().map(scrub_text);

        for (key, value) in redacted.metadata.iter_mut() {
            if self.is_sensitive_key(key) {
                if !value.is_null() {
                    *value = Value::String(REDACTION_TOKEN.to_string());
                }
            } else if let Value::String(text) = value {
                *text = scrub_text(text);
            }
        }

        redacted
    }

    pub fn redact_all<'a>(&self, transactions: impl IntoIterator<Item = &'a Transaction>) -> Vec<Transaction> {
        transactions.into_iter().map(|tx| self.redact(tx)).collect()
    }
}

/// Replace e-mail addresses and IBANs (compact or space-grouped) in free text
pub fn scrub_text(text: &str) -> String {
    let text = EMAIL_PATTERN.replace_all(text, REDACTION_TOKEN);
    IBAN_PATTERN.replace_all(&text, REDACTION_TOKEN).into_owned()
}
