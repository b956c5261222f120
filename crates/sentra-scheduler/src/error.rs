//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur in the job scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` was called more than once.
    #[error("scheduler already started")]
    AlreadyStarted,

    /// A job with this id is already scheduled.
    #[error("duplicate job id: {id}")]
    DuplicateJob {
        /// The conflicting job id.
        id: String,
    },

    /// No handler is registered under this name.
    #[error("unknown job handler: {name}")]
    UnknownHandler {
        /// The missing handler name.
        name: String,
    },

    /// The trigger specification cannot be parsed.
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    /// The job store failed.
    #[error("job store error: {0}")]
    StorageError(String),
}

impl From<sentra_storage::StorageError> for SchedulerError {
    fn from(e: sentra_storage::StorageError) -> Self {
        Self::StorageError(e.to_string())
    }
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
