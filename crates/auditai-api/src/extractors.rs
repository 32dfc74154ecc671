//! Custom Axum Extractors
//!
//! Request extractors for validation.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Validated JSON Extractor
// =============================================================================

/// JSON extractor with validation.
///
/// Malformed bodies and failed validation rules are both rejected with a 400
/// before the handler runs.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + validator::Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::BadRequest(e.body_text()))?;

        value
            .validate()
            .map_err(|e| ApiError::Validation(format_validation_errors(&e)))?;

        Ok(ValidatedJson(value))
    }
}

/// Flatten validator output into `field: message` pairs, sorted by field
pub fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: validation failed ({})", field, e.code),
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{ValidationError, ValidationErrors};

    #[test]
    fn test_format_validation_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("question", ValidationError::new("length"));
        let mut range = ValidationError::new("range");
        range.message = Some("must be between 1 and 500".into());
        errors.add("max_transactions", range);

        assert_eq!(
            format_validation_errors(&errors),
            "max_transactions: must be between 1 and 500, question: validation failed (length)"
        );
    }
}
