//! The event catalog and its startup reconciliation.
//!
//! The catalog below is the single source of truth for event kinds. At
//! process start [`sync_catalog`] pushes it into durable storage:
//! create-or-update by identifier, never delete. Kinds are not
//! user-editable at runtime.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AuditResult;
use crate::storage::AuditStorage;

/// A catalogued, named class of auditable occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventKind {
    /// Stable unique identifier for programmatic use (e.g. `NEW_DEVICE`).
    pub identifier: String,
    /// Human-readable name.
    pub name: String,
}

impl EventKind {
    /// Create an event kind.
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Every known event kind as `(identifier, name)`.
pub const EVENT_CATALOG: &[(&str, &str)] = &[
    ("NEW_DEVICE", "New device registered"),
    ("DATA_RECEIVED", "Sensor data received"),
    ("CONFIG_FETCHED", "Sensor configuration fetched"),
    ("ADMIN_LOGIN", "Administrator signed in"),
    ("DASHBOARD_VIEWED", "Dashboard viewed"),
    ("DOS_DETECTED", "Denial-of-service attack detected"),
];

/// Reconcile the static catalog into durable storage.
///
/// Creates missing kinds and updates names of existing ones; kinds absent
/// from the catalog are left untouched. Must run before the first publish;
/// a failure here is fatal to startup since the pipeline cannot operate
/// against an unsynchronized catalog.
///
/// # Errors
///
/// Returns the first storage error encountered.
pub async fn sync_catalog(storage: &dyn AuditStorage) -> AuditResult<()> {
    for (identifier, name) in EVENT_CATALOG {
        storage
            .upsert_kind(&EventKind::new(*identifier, *name))
            .await?;
    }
    info!(kinds = EVENT_CATALOG.len(), "event catalog synchronized");
    Ok(())
}
