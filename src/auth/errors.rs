//! Session error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the account session manager and its collaborators
#[derive(Debug, Error)]
pub enum SessionError {
    /// Missing or blank required input
    #[error("validation failed: {0}")]
    Validation(String),

    /// Uniqueness violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// No matching record
    #[error("not found: {0}")]
    NotFound(String),

    /// Credential or token mismatch, or expiry
    #[error("unauthorized: {0}")]
    Auth(String),

    /// The media host returned no usable reference
    #[error("upload failed: {0}")]
    Upload(String),

    /// Invariant violated or backing service failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Upload(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Auth(_) => "unauthorized",
            Self::Upload(_) => "upload_error",
            Self::Internal(_) => "server_error",
        }
    }

    /// Message safe to show to the caller. Internal details stay in the logs.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::NotFound(msg)
            | Self::Auth(msg)
            | Self::Upload(msg) => msg,
            Self::Internal(_) => "Something went wrong, please try again later",
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal(detail) = &self {
            error!("internal error: {}", detail);
        }

        let body = Json(json!({
            "code": status.as_u16(),
            "data": null,
            "message": self.user_message(),
            "success": false,
            "error": self.error_code(),
        }));

        (status, body).into_response()
    }
}
