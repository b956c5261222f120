//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur in the audit pipeline.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The event identifier is not in the catalog.
    #[error("unknown event kind: {identifier}")]
    UnknownEvent {
        /// The identifier that failed to resolve.
        identifier: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<sentra_storage::StorageError> for AuditError {
    fn from(e: sentra_storage::StorageError) -> Self {
        match e {
            sentra_storage::StorageError::Serialization(msg) => Self::SerializationError(msg),
            other => Self::StorageError(other.to_string()),
        }
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
