//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_telemetry::prelude::*;` to import all essential types.

// Errors
pub use crate::{TelemetryError, TelemetryResult};

// Logging setup
pub use crate::{LogConfig, LogFormat, setup_default_logging, setup_logging};
