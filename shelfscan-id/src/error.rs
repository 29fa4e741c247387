//! Error types for shelfscan-id
//!
//! [`IdentifyError`] is what the pipeline returns; [`ApiError`] is what the
//! HTTP layer renders.

use crate::types::UnknownVertical;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-level identification failure
///
/// Strategy failures never show up here; the cascade absorbs them.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// Nothing to identify from (no text, logos, labels, code or usable image)
    #[error("No usable signals: {0}")]
    NoSignals(String),

    /// Signal extraction failed and the request carried no signals
    #[error("Signal extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    InvalidVertical(#[from] UnknownVertical),

    /// Caller cancelled before the cascade finished
    #[error("Identification cancelled")]
    Cancelled,
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Well-formed request that cannot be identified (422)
    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    /// Request abandoned (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// shelfscan-common error
    #[error("Common error: {0}")]
    Common(#[from] shelfscan_common::Error),
}

impl From<IdentifyError> for ApiError {
    fn from(err: IdentifyError) -> Self {
        match err {
            IdentifyError::NoSignals(_) | IdentifyError::Extraction(_) => {
                ApiError::Unprocessable(err.to_string())
            }
            IdentifyError::InvalidVertical(_) => ApiError::BadRequest(err.to_string()),
            IdentifyError::Cancelled => ApiError::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", msg)
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
