//! Sentra Scheduler - the shared background job runner.
//!
//! One scheduler instance serves the whole process: deferred webhook batch
//! dispatch schedules one-shot jobs here, and the retention job runs as a
//! recurring cron job. The scheduler is an explicitly constructed service
//! owned by the process entry point and passed by reference to whoever
//! needs it, never ambient global state.
//!
//! # Durability
//!
//! One-shot job records persist in the KV store and are re-armed by
//! [`Scheduler::start`] after a restart. A record whose run time passed
//! within the misfire grace window still runs; older records are dropped
//! with a warning. Recurring jobs are re-registered by the entry point at
//! every boot, so they are not persisted.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sentra_scheduler::{JobHandler, Scheduler};
//!
//! struct Noop;
//!
//! #[async_trait::async_trait]
//! impl JobHandler for Noop {
//!     async fn execute(
//!         &self,
//!         _payload: serde_json::Value,
//!     ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> sentra_scheduler::SchedulerResult<()> {
//! let scheduler = Scheduler::in_memory();
//! scheduler.register_handler("noop", Arc::new(Noop));
//! scheduler.start().await?;
//! scheduler
//!     .schedule_cron("tick", "0 0 3 * * *", "noop", serde_json::Value::Null)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod job;
mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use job::{JobHandler, JobRecord, Trigger};
pub use scheduler::{DEFAULT_MISFIRE_GRACE, Scheduler};
