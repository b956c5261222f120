//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_config::prelude::*;` to import all essential types.

// Errors
pub use crate::{ConfigError, ConfigResult};

// Config sections
pub use crate::{DeliverySection, LoggingSection, MonitorConfig, RetentionSection, SensorSection};

// Loading
pub use crate::load;
