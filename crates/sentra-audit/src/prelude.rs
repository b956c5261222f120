//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Catalog
pub use crate::{EVENT_CATALOG, EventKind, sync_catalog};

// Log
pub use crate::{AuditLog, LogEntry};

// Storage
pub use crate::{AuditStorage, KvAuditStorage};

// Devices
pub use crate::DeviceStore;
