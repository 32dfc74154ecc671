//! Output normalization
//!
//! Providers wrap the same answer differently: Ollama models like to echo an
//! `Assistant:` prefix, chat models wrap JSON in Markdown fences. Everything
//! handed back to callers goes through [`normalize_text`] first.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{LLMError, Result};

pub const DEFAULT_EXPLANATION: &str = "No explanation returned.";
pub const DEFAULT_RISK_LEVEL: &str = "Medium";
pub const DEFAULT_POSSIBLE_CAUSE: &str = "Unknown";
pub const DEFAULT_RECOMMENDED_ACTION: &str = "Review transaction and supporting documents.";

const ROLE_ECHO: &str = "assistant:";

/// Trim, drop a leading role echo, and unwrap a fenced block
pub fn normalize_text(raw: &str) -> String {
    let mut text = raw.trim();

    if text.len() >= ROLE_ECHO.len()
        && text.is_char_boundary(ROLE_ECHO.len())
        && text[..ROLE_ECHO.len()].eq_ignore_ascii_case(ROLE_ECHO)
    {
        text = text[ROLE_ECHO.len()..].trim_start();
    }

    if let Some(rest) = text.strip_prefix("```") {
        // Opening fence may carry a language tag (```json)
        let body = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
        text = body.trim_end();
        if let Some(stripped) = text.strip_suffix("```") {
            text = stripped;
        }
    }

    text.trim().to_string()
}

/// Structured answer to an explain request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub explanation: String,
    pub risk_level: String,
    pub possible_cause: String,
    pub recommended_action: String,
}

impl Default for Explanation {
    fn default() -> Self {
        Self {
            explanation: DEFAULT_EXPLANATION.to_string(),
            risk_level: DEFAULT_RISK_LEVEL.to_string(),
            possible_cause: DEFAULT_POSSIBLE_CAUSE.to_string(),
            recommended_action: DEFAULT_RECOMMENDED_ACTION.to_string(),
        }
    }
}

/// Parse a model answer into an [`Explanation`], filling in defaults.
///
/// Fails with `InvalidResponse` when no JSON object can be found.
pub fn parse_explanation(raw: &str) -> Result<Explanation> {
    let text = normalize_text(raw);
    let object = extract_object(&text).ok_or_else(|| {
        LLMError::invalid_response("explanation was not a JSON object")
    })?;

    Ok(Explanation {
        explanation: field(&object, "explanation", DEFAULT_EXPLANATION),
        risk_level: normalize_risk(object.get("risk_level")),
        possible_cause: field(&object, "possible_cause", DEFAULT_POSSIBLE_CAUSE),
        recommended_action: field(&object, "recommended_action", DEFAULT_RECOMMENDED_ACTION),
    })
}

fn extract_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str(text) {
        return Some(map);
    }
    // Models sometimes add a sentence before or after the object
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn field(object: &Map<String, Value>, key: &str, default: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn normalize_risk(value: Option<&Value>) -> String {
    let Some(Value::String(raw)) = value else {
        return DEFAULT_RISK_LEVEL.to_string();
    };
    match raw.trim().to_lowercase().as_str() {
        "low" => "Low",
        "medium" => "Medium",
        "high" => "High",
        _ => DEFAULT_RISK_LEVEL,
    }
    .to_string()
}
