//! Job records, triggers, and the handler trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// When a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Run once at the given instant.
    Once {
        /// The instant to run at.
        run_at: DateTime<Utc>,
    },
    /// Run on a recurring cron schedule (seconds-resolution expression,
    /// e.g. `"0 0 3 * * *"` for daily at 03:00 UTC).
    Cron {
        /// The cron expression.
        expr: String,
    },
}

/// A scheduled job: identity, trigger, and what to run.
///
/// The handler is referenced by registered name rather than held as a
/// closure so that one-shot records can be persisted and re-armed after a
/// restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier. Duplicate registration is rejected.
    pub id: String,
    /// When to run.
    pub trigger: Trigger,
    /// Name of the registered [`JobHandler`].
    pub handler: String,
    /// Opaque payload handed to the handler.
    pub payload: Value,
}

/// Work executed by the scheduler.
///
/// A failing handler is logged and never crashes the process; the
/// scheduler does not retry.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job with the payload captured at scheduling time.
    ///
    /// # Errors
    ///
    /// Any error is logged by the scheduler and otherwise discarded.
    async fn execute(&self, payload: Value) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
