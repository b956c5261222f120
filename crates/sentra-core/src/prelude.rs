//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_core::prelude::*;` to import all essential types.

// Identifiers and time
pub use crate::{DeviceId, LogEntryId, Timestamp, WebhookId};

// Domain types
pub use crate::Device;
