//! The audit log writer and its read/prune surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sentra_core::{Device, DeviceId, LogEntryId, Timestamp};
use serde_json::Value;
use tracing::debug;

use crate::entry::LogEntry;
use crate::error::{AuditError, AuditResult};
use crate::storage::{AuditStorage, KvAuditStorage};

/// The audit log: sole writer of [`LogEntry`] records.
///
/// Appends assign the server timestamp and a monotonic insertion counter;
/// the result is durable and immediately visible to subsequent reads.
/// Reading and pruning go through the same handle, so the retention job
/// and the dispatch engine share one view of the log.
pub struct AuditLog {
    storage: Arc<dyn AuditStorage>,
    seq: AtomicU64,
}

impl AuditLog {
    /// Open the log over existing storage, resuming the insertion counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored counter cannot be read.
    pub async fn open(storage: Arc<dyn AuditStorage>) -> AuditResult<Self> {
        let last = storage.last_seq().await?;
        Ok(Self {
            storage,
            seq: AtomicU64::new(last),
        })
    }

    /// Create a log over a fresh in-memory store (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(KvAuditStorage::in_memory()),
            seq: AtomicU64::new(0),
        }
    }

    /// The underlying storage handle.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn AuditStorage> {
        &self.storage
    }

    /// Write one immutable record for an occurrence of `identifier`.
    ///
    /// `details` is stored as-is; no validation happens beyond resolving
    /// the event kind.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::UnknownEvent`] if the identifier is not
    /// catalogued, or a storage error if the write fails.
    pub async fn append(
        &self,
        identifier: &str,
        actor: Option<String>,
        device: Option<Device>,
        details: Value,
    ) -> AuditResult<LogEntry> {
        let Some(kind) = self.storage.get_kind(identifier).await? else {
            return Err(AuditError::UnknownEvent {
                identifier: identifier.to_string(),
            });
        };

        let seq = self.seq.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        let entry = LogEntry::new(seq, kind, actor, device, details);
        self.storage.store_entry(&entry).await?;
        debug!(entry = %entry.id, event = %entry.event.identifier, "audit entry written");
        Ok(entry)
    }

    /// Get an entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub async fn get(&self, id: &LogEntryId) -> AuditResult<Option<LogEntry>> {
        self.storage.get_entry(id).await
    }

    /// Load the given entries, ordered by ascending timestamp (insertion
    /// order breaking ties). Ids that no longer resolve are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub async fn get_many(&self, ids: &[LogEntryId]) -> AuditResult<Vec<LogEntry>> {
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.storage.get_entry(id).await? {
                entries.push(entry);
            }
        }
        entries.sort_by_key(LogEntry::sort_key);
        Ok(entries)
    }

    /// Total number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval fails.
    pub async fn count(&self) -> AuditResult<usize> {
        Ok(self.storage.list_entries().await?.len())
    }

    /// Delete entries older than `cutoff`. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deletion fails.
    pub async fn prune_older_than(&self, cutoff: Timestamp) -> AuditResult<u64> {
        let mut deleted: u64 = 0;
        for entry in self.storage.list_entries().await? {
            if entry.timestamp < cutoff {
                self.storage.delete_entry(&entry.id).await?;
                deleted = deleted.saturating_add(1);
            }
        }
        Ok(deleted)
    }

    /// Keep at most `max` entries, deleting the oldest. Returns the number
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deletion fails.
    pub async fn prune_to_count(&self, max: u64) -> AuditResult<u64> {
        let entries = self.storage.list_entries().await?;
        let total = entries.len() as u64;
        if total <= max {
            return Ok(0);
        }
        let excess = total.saturating_sub(max);
        let mut deleted: u64 = 0;
        for entry in entries.iter().take(usize::try_from(excess).unwrap_or(usize::MAX)) {
            self.storage.delete_entry(&entry.id).await?;
            deleted = deleted.saturating_add(1);
        }
        Ok(deleted)
    }

    /// Clear the device reference on every entry for `device`. Returns the
    /// number of entries updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn detach_device(&self, device: &DeviceId) -> AuditResult<u64> {
        self.storage.detach_device(device).await
    }

    /// Delete every entry recorded against `device`. Returns the number
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deletion fails.
    pub async fn prune_device_entries(&self, device: &DeviceId) -> AuditResult<u64> {
        let mut deleted: u64 = 0;
        for entry in self.storage.list_entries().await? {
            if entry.device.as_ref().is_some_and(|d| d.id == *device) {
                self.storage.delete_entry(&entry.id).await?;
                deleted = deleted.saturating_add(1);
            }
        }
        Ok(deleted)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("seq", &self.seq.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
