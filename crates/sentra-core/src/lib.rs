//! Sentra Core - Shared types for the Sentra monitoring backend.
//!
//! This crate provides:
//! - Newtype identifiers for audit records, webhooks, and devices
//! - A `Timestamp` wrapper for consistent time handling
//! - The `Device` domain type shared by the audit pipeline and the
//!   retention job
//!
//! All types here are dependency-light and serializable; domain logic
//! lives in the crates that own the corresponding stores.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod device;
mod types;

pub use device::Device;
pub use types::{DeviceId, LogEntryId, Timestamp, WebhookId};
