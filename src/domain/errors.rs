//! # Domain Errors
//!
//! Typed errors returned by the store and passed through the service
//! unchanged. The HTTP layer maps each kind to a status code.

use thiserror::Error;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain error kinds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Malformed cursor or request parameter
    #[error("given param is not valid")]
    BadParamInput,

    /// The requested record does not exist
    #[error("your requested item is not found")]
    NotFound,

    /// The record already exists
    #[error("your item already exists")]
    Conflict,

    // ==================
    // Server Errors (5xx)
    // ==================
    /// The request deadline expired before the operation completed
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Storage or connectivity failure, or a broken store invariant
    #[error("internal server error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadParamInput => "BAD_PARAM_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::BadParamInput | Self::NotFound | Self::Conflict)
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::OperationInterrupted) => Self::DeadlineExceeded,
            _ => Self::Internal(err.to_string()),
        }
    }
}
