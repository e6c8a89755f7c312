//! # HTTP Errors
//!
//! Maps domain errors and request rejections onto status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::DomainError;

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced at the HTTP boundary
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Error from the service or store
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Request body could not be bound to a record
    #[error("{0}")]
    UnprocessableBody(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Domain(err) => match err {
                DomainError::BadParamInput => StatusCode::BAD_REQUEST,
                DomainError::NotFound => StatusCode::NOT_FOUND,
                DomainError::Conflict => StatusCode::CONFLICT,
                // Store failures are 500s; the body code tells a timeout apart
                DomainError::DeadlineExceeded | DomainError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::UnprocessableBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            ApiError::Domain(err) => err.is_client_error(),
            ApiError::UnprocessableBody(_) => true,
        }
    }

    /// Stable error code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Domain(err) => err.code(),
            ApiError::UnprocessableBody(_) => "UNPROCESSABLE_BODY",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: &'static str,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.to_string(),
            code: err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if !self.is_client_error() {
            error!(status = status.as_u16(), code = self.code(), "{}", self);
        } else {
            warn!(status = status.as_u16(), code = self.code(), "{}", self);
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
