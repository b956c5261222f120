//! The immutable audit record.

use sentra_core::{Device, LogEntryId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::EventKind;

/// One immutable record of an event occurrence.
///
/// The timestamp is server-assigned at creation; `seq` is a writer-assigned
/// monotonic insertion counter that breaks ordering ties between entries
/// sharing a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique entry identifier.
    pub id: LogEntryId,
    /// Insertion counter, strictly increasing per writer.
    pub seq: u64,
    /// The event kind this entry records.
    pub event: EventKind,
    /// The acting principal, if any (e.g. an admin username).
    pub actor: Option<String>,
    /// The source device, if any, snapshotted at log time.
    pub device: Option<Device>,
    /// When the entry was written.
    pub timestamp: Timestamp,
    /// Free-form structured details, stored as-is.
    pub details: Value,
}

impl LogEntry {
    /// Create a new entry with a fresh id and the current server time.
    pub(crate) fn new(
        seq: u64,
        event: EventKind,
        actor: Option<String>,
        device: Option<Device>,
        details: Value,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            seq,
            event,
            actor,
            device,
            timestamp: Timestamp::now(),
            details,
        }
    }

    /// Ordering key: ascending timestamp, insertion order as tie-break.
    #[must_use]
    pub fn sort_key(&self) -> (Timestamp, u64) {
        (self.timestamp, self.seq)
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self
            .actor
            .clone()
            .or_else(|| self.device.as_ref().map(|d| d.ip_address.to_string()))
            .unwrap_or_else(|| "system".to_string());
        write!(f, "{} from {} at {}", self.event.name, source, self.timestamp)
    }
}
