//! HTTP error mapping.
//!
//! Every failure leaves the daemon as `{"success": false, "message": "..."}`
//! with the status code chosen by the variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Conflict(String),
    /// A collaborator the endpoint needs is not configured.
    #[error("{0}")]
    Misconfigured(String),
    /// `message` is returned to the caller; `cause` is only logged.
    #[error("{message}")]
    Internal { message: String, cause: anyhow::Error },
}

impl ApiError {
    pub fn internal(message: impl Into<String>, cause: anyhow::Error) -> Self {
        ApiError::Internal {
            message: message.into(),
            cause,
        }
    }

    /// Internal error whose top-level message is safe to show
    /// (gateway and mail provider failures).
    pub fn upstream(cause: anyhow::Error) -> Self {
        ApiError::Internal {
            message: cause.to_string(),
            cause,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Misconfigured(_) | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(cause: anyhow::Error) -> Self {
        ApiError::internal("Server error", cause)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal { message, cause } => {
                tracing::error!(error = %format!("{cause:#}"), "{message}");
            }
            ApiError::Misconfigured(message) => tracing::error!("misconfigured: {message}"),
            _ => {}
        }
        let body = json!({ "success": false, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
