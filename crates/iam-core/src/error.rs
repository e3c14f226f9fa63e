//! Error types for lifecycle and visibility operations
//!
//! Every failure surfaces one stable [`ErrorKind`] plus a human-readable
//! message. Store and graph failures without a semantic meaning for the
//! caller are logged here and collapse to [`IamError::Internal`].

use iam_org::{IllegalTransition, TableError, TokenError};
use thiserror::Error;

use crate::graph::GraphError;
use crate::store::StoreError;

/// Stable error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Entity or membership row absent
    NotFound,
    /// Malformed input
    InvalidArgument,
    /// Illegal status transition
    FailedPrecondition,
    /// Would break an invariant such as the last-administrator rule
    Conflict,
    /// Caller cancelled before commit
    Cancelled,
    /// Store or graph failure
    Internal,
}

/// IAM core error.
#[derive(Debug, Error)]
pub enum IamError {
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input could not be interpreted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current state
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation would violate an invariant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cancelled by the caller before commit
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for IAM core operations.
pub type IamResult<T> = Result<T, IamError>;

impl IamError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IamError::NotFound(_) => ErrorKind::NotFound,
            IamError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            IamError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            IamError::Conflict(_) => ErrorKind::Conflict,
            IamError::Cancelled => ErrorKind::Cancelled,
            IamError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, IamError::Internal(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            IamError::NotFound(_) => 404,
            IamError::InvalidArgument(_) => 400,
            IamError::FailedPrecondition(_) => 412,
            IamError::Conflict(_) => 409,
            IamError::Cancelled => 499,
            IamError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            IamError::NotFound(_) => "NOT_FOUND",
            IamError::InvalidArgument(_) => "INVALID_ARGUMENT",
            IamError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            IamError::Conflict(_) => "CONFLICT",
            IamError::Cancelled => "CANCELLED",
            IamError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<IllegalTransition> for IamError {
    fn from(err: IllegalTransition) -> Self {
        IamError::FailedPrecondition(err.to_string())
    }
}

impl From<TableError> for IamError {
    fn from(err: TableError) -> Self {
        IamError::InvalidArgument(err.to_string())
    }
}

impl From<TokenError> for IamError {
    fn from(err: TokenError) -> Self {
        IamError::InvalidArgument(err.to_string())
    }
}

impl From<StoreError> for IamError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                IamError::NotFound(format!("{} {}", entity, id))
            }
            StoreError::Conflict { message } => IamError::Conflict(message),
            other => {
                tracing::error!(error = %other, "Store operation failed");
                IamError::Internal("storage failure".to_string())
            }
        }
    }
}

impl From<GraphError> for IamError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound { resource } => IamError::NotFound(resource),
            other => {
                tracing::error!(error = %other, "Relationship graph call failed");
                IamError::Internal("relationship graph failure".to_string())
            }
        }
    }
}
