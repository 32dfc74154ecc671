//! API error handling
//!
//! Every failure leaves the service as `{code, message, request_id}`.
//! `request_id` is filled in by [`crate::middleware::stamp_request_id`],
//! which picks the [`ErrorResponse`] up from the response extensions.

use auditai_ledger::LedgerError;
use auditai_llm::OrchestratorError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Client-facing message for any provider failure
pub const PROVIDER_ERROR_MESSAGE: &str = "LLM provider request failed";

#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    // =========================================================================
    // Upstream / Internal Errors
    // =========================================================================
    #[error(transparent)]
    Provider(#[from] OrchestratorError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Provider and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Provider(_) => PROVIDER_ERROR_MESSAGE.to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// API error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request ID for tracking
    pub request_id: Option<String>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.public_message(),
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Provider(err) => tracing::error!(
                provider = %err.provider,
                attempts = err.attempts,
                error_kind = ?err.kind(),
                error = %err.source,
                "Provider failure surfaced as 502"
            ),
            Self::Internal(detail) => tracing::error!(error = %detail, "Internal error"),
            _ => {}
        }

        let status = self.status_code();
        let error_response = ErrorResponse::from(&self);

        let mut response = (status, Json(error_response.clone())).into_response();
        response.extensions_mut().insert(error_response);
        response
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => Self::NotFound("Transaction not found".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(crate::extractors::format_validation_errors(&err))
    }
}
