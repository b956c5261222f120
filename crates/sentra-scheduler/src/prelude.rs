//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_scheduler::prelude::*;` to import all essential types.

// Errors
pub use crate::{SchedulerError, SchedulerResult};

// Jobs
pub use crate::{JobHandler, JobRecord, Trigger};

// Scheduler
pub use crate::{DEFAULT_MISFIRE_GRACE, Scheduler};
