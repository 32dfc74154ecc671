//! Request Handlers

pub mod anomalies;
pub mod chat;
pub mod explain;
pub mod health;
pub mod metrics;
pub mod report;

use crate::error::ApiError;

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
