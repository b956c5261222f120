//! Sentra Config - configuration for the monitoring backend.
//!
//! A single TOML file with `#[serde(default)]` sections, so a bare
//! `[section]` header (or no file at all) yields working production
//! defaults. Covers sensor cadence and throttling, audit retention, webhook
//! delivery limits, and logging.
//!
//! # Example
//!
//! ```rust
//! use sentra_config::MonitorConfig;
//!
//! let config: MonitorConfig = toml::from_str(
//!     r#"
//!     [retention]
//!     log_max_age_days = 30
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.retention.log_max_age_days, Some(30));
//! assert_eq!(config.delivery.max_concurrent, 64);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod loader;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use types::{
    DeliverySection, LoggingSection, MonitorConfig, RetentionSection, SensorSection,
};
