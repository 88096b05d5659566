//! API error types.

use crate::services::{ErrorKind, ServiceError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Service(e) => match e {
                ServiceError::Unauthenticated(_) => "unauthorized",
                ServiceError::Unauthorized(_) => "forbidden",
                ServiceError::ForeignStep { .. } => "foreign_step",
                _ => match e.kind() {
                    ErrorKind::NotFound => "not_found",
                    ErrorKind::Unauthorized => "forbidden",
                    ErrorKind::Conflict => "conflict",
                    ErrorKind::InvalidArgument => "invalid_argument",
                    ErrorKind::StorageFailure => "storage_failure",
                },
            },
        }
    }

    /// Client-facing message. Unlike `Display` it carries no kind prefix,
    /// since `code` already says that.
    pub fn message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::Unauthorized(msg) => msg.clone(),
            Self::Service(e) => e.detail(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Service(ServiceError::Unauthenticated(_)) => StatusCode::UNAUTHORIZED,
            Self::Service(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        crate::metrics::record_api_error(self.code());
        if status.is_server_error() {
            let source = std::error::Error::source(&self).map(ToString::to_string);
            tracing::error!(error = %self, source = ?source, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
