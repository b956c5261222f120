//! Sentra Audit - event catalog and audit log.
//!
//! This crate provides:
//! - The static catalog of auditable event kinds, reconciled into durable
//!   storage at startup
//! - Immutable [`LogEntry`] records with server-assigned timestamps
//! - The [`AuditLog`] writer and its read/prune surface
//! - The [`DeviceStore`] tracking sensor devices by reporting address
//!
//! # Immutability
//!
//! A log entry is never mutated after it is written. The only exceptions
//! are bulk deletion and device detachment, both reserved for the
//! retention job; the notification pipeline only ever reads.
//!
//! # Example
//!
//! ```
//! use sentra_audit::{AuditLog, sync_catalog};
//!
//! # async fn example() -> sentra_audit::AuditResult<()> {
//! let log = AuditLog::in_memory();
//! sync_catalog(log.storage().as_ref()).await?;
//!
//! let entry = log
//!     .append(
//!         "ADMIN_LOGIN",
//!         Some("ops".to_string()),
//!         None,
//!         serde_json::json!({ "ip_address": "203.0.113.9" }),
//!     )
//!     .await?;
//! assert_eq!(entry.event.identifier, "ADMIN_LOGIN");
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

mod catalog;
mod devices;
mod entry;
mod error;
mod log;
mod storage;

pub use catalog::{EVENT_CATALOG, EventKind, sync_catalog};
pub use devices::DeviceStore;
pub use entry::LogEntry;
pub use error::{AuditError, AuditResult};
pub use log::AuditLog;
pub use storage::{AuditStorage, KvAuditStorage};
