//! Sentra Telemetry - logging setup for the monitoring backend.
//!
//! This crate provides:
//! - Configurable logging setup over the tracing ecosystem
//! - Multiple output formats (pretty, compact, JSON)
//! - Per-crate level directives
//!
//! Operators discover pipeline failures (template violations, delivery
//! errors, scheduler misfires) exclusively through this log stream; there
//! is no in-band failure surface.
//!
//! # Example
//!
//! ```rust,no_run
//! use sentra_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), sentra_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("sentra_webhooks=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("telemetry ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
