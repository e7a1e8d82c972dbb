//! Error types and handling for the ticket notes service
//!
//! This module defines all error types used throughout the system and how
//! each of them is rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ticket notes service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("{0}")]
    Reference(String),

    /// The target entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("{0}")]
    Conflict(String),

    /// Deletion blocked because other documents still reference the target
    #[error("{0}")]
    AssignedNotes(String),

    /// Storage layer errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Password hashing failures
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store could not be reached or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A unique index rejected the write
    #[error("Duplicate key on {index}: {key}")]
    DuplicateKey {
        /// Name of the unique index
        index: &'static str,
        /// Offending key value
        key: String,
    },

    /// Disk I/O operation failed
    #[error("Disk I/O failed: {0}")]
    DiskIo(#[from] std::io::Error),

    /// A counter reached its maximum value
    #[error("Counter {0} exhausted")]
    CounterExhausted(String),

    /// Persisted data could not be decoded
    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a reference error
    pub fn reference(msg: impl Into<String>) -> Self {
        Self::Reference(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a client error (4xx equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Reference(_)
                | Error::NotFound(_)
                | Error::Conflict(_)
                | Error::AssignedNotes(_)
        )
    }

    /// Check if this is a server error (5xx equivalent)
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// HTTP status for this error.
    ///
    /// `NotFound` and `AssignedNotes` answer 400, matching the published
    /// contract of the API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::Reference(_)
            | Error::NotFound(_)
            | Error::AssignedNotes(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error.".to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
