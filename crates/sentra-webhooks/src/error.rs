//! Webhook-related error types.

use thiserror::Error;

/// Errors that can occur in the notification engine.
///
/// None of these ever reach an event producer: template and delivery
/// failures terminate as log records, and registry errors surface only to
/// the operator performing the configuration change.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The configured target URL does not parse.
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// The body template failed to render (syntax or evaluation error).
    #[error("template error: {0}")]
    Template(String),

    /// The rendered body is not a single JSON object.
    #[error("rendered payload is not a JSON object: {rendered}")]
    ContractViolation {
        /// The offending rendered text.
        rendered: String,
    },

    /// The outbound HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(String),

    /// Storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<sentra_storage::StorageError> for WebhookError {
    fn from(e: sentra_storage::StorageError) -> Self {
        match e {
            sentra_storage::StorageError::Serialization(msg) => Self::SerializationError(msg),
            other => Self::StorageError(other.to_string()),
        }
    }
}

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;
