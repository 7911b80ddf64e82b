//! Error handling for the API server
//!
//! Handlers return `Result<T, ApiError>`; each variant maps to one HTTP
//! status and the JSON failure envelope:
//!
//! ```json
//! { "success": false, "code": "not_found", "message": "Task not found" }
//! ```
//!
//! The Permit proxy endpoints answer failures with plain text instead, via
//! [`ApiError::Upstream`].

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskorg_shared::workflows::WorkflowError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Forbidden (403), the policy service said no
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate membership
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500) with the underlying error text
    InternalError { message: String, error: String },

    /// Plain-text 500 from the Permit proxy endpoints
    Upstream(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,

    /// Error code (e.g., "bad_request", "not_found")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Underlying error, for store and policy failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Maps a workflow rejection to its HTTP form
    ///
    /// `failure` is the message shown when the store or policy service
    /// failed, e.g. "Failed to create task".
    pub fn workflow(err: WorkflowError, failure: &str) -> Self {
        match err {
            WorkflowError::InvalidInput(msg) => ApiError::BadRequest(msg),
            WorkflowError::NotFound(msg) => ApiError::NotFound(msg),
            WorkflowError::Conflict(msg) => ApiError::Conflict(msg),
            err @ WorkflowError::PermissionDenied { .. } => ApiError::Forbidden(err.to_string()),
            err @ (WorkflowError::Store(_) | WorkflowError::Policy(_)) => ApiError::InternalError {
                message: failure.to_string(),
                error: err.to_string(),
            },
        }
    }

    /// Body that could not be read as the expected JSON
    ///
    /// Answers with the workflow's own `message` (e.g. "Invalid task data")
    /// rather than the extractor's text.
    pub fn invalid_body(message: &str, rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::BadRequest(message.to_string())
    }

    /// Plain-text proxy failure: `"{prefix} {error}"`
    pub fn upstream(prefix: &str, err: impl fmt::Display) -> Self {
        ApiError::Upstream(format!("{} {}", prefix, err))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError { message, error } => {
                write!(f, "Internal error: {}: {}", message, error)
            }
            ApiError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, error, details) = match self {
            ApiError::Upstream(text) => {
                tracing::error!(error = %text, "Policy proxy call failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, text).into_response();
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                None,
                Some(errors),
            ),
            ApiError::InternalError { message, error } => {
                tracing::error!(error = %error, "{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    message,
                    Some(error),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            code: code.to_string(),
            message,
            error,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(details)
    }
}
