//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.
//! Provider and storage details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use sitecraft_core::SiteError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Request failed validation (400)
    Validation { field: &'static str, reason: String },

    /// No artifact for the identifier (404)
    NotFound { resource: &'static str, id: String },

    /// Every provider failed (502, logged)
    Generation(SiteError),

    /// Internal error (500, logged)
    Internal { message: String },
}

impl ApiError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation { field, reason } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": format!("{}: {}", field, reason)
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Generation(e) => {
                tracing::error!(error = %e, "generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": "generation_failed",
                        "message": "no provider produced a usable site, please try again"
                    }),
                )
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<SiteError> for ApiError {
    fn from(e: SiteError) -> Self {
        match e {
            SiteError::NotFound { identifier } => Self::NotFound {
                resource: "artifact",
                id: identifier,
            },
            failed @ (SiteError::AllProvidersFailed { .. }
            | SiteError::ProviderFailure { .. }
            | SiteError::ArtifactTooShort { .. }) => Self::Generation(failed),
            other => Self::Internal {
                message: other.to_string(),
            },
        }
    }
}
