//! Audit storage trait and KV-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use sentra_core::{DeviceId, LogEntryId};
use sentra_storage::{KvStore, MemoryKvStore};

use crate::catalog::EventKind;
use crate::entry::LogEntry;
use crate::error::{AuditError, AuditResult};

/// Storage backend for the event catalog and the audit log.
///
/// Implementations must be thread-safe. Entries are returned in insertion
/// order (ascending `seq`), which the writer keeps aligned with ascending
/// timestamps.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Create or update an event kind by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the kind cannot be persisted.
    async fn upsert_kind(&self, kind: &EventKind) -> AuditResult<()>;

    /// Look up an event kind by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn get_kind(&self, identifier: &str) -> AuditResult<Option<EventKind>>;

    /// List all known event kinds.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn list_kinds(&self) -> AuditResult<Vec<EventKind>>;

    /// Persist a log entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted.
    async fn store_entry(&self, entry: &LogEntry) -> AuditResult<()>;

    /// Get a log entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn get_entry(&self, id: &LogEntryId) -> AuditResult<Option<LogEntry>>;

    /// All entries, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn list_entries(&self) -> AuditResult<Vec<LogEntry>>;

    /// Delete a log entry. Returns `true` if it existed.
    ///
    /// Reserved for the retention job; the notification pipeline never
    /// deletes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn delete_entry(&self, id: &LogEntryId) -> AuditResult<bool>;

    /// Clear the device reference on every entry pointing at `device`.
    ///
    /// Returns the number of entries updated. Reserved for the retention
    /// job when pruning a device whose entries are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn detach_device(&self, device: &DeviceId) -> AuditResult<u64>;

    /// The highest insertion counter stored, or 0 when empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn last_seq(&self) -> AuditResult<u64>;
}

// -- Namespace constants --

const NS_KINDS: &str = "audit:kinds";
const NS_ENTRIES: &str = "audit:entries";
const NS_ENTRY_INDEX: &str = "audit:entry_index";

/// Entries are keyed by zero-padded `seq`, so lexical key order is
/// insertion order.
fn seq_key(seq: u64) -> String {
    format!("{seq:020}")
}

/// KV-backed storage for the catalog and the audit log.
///
/// Works over any [`KvStore`]; use [`KvAuditStorage::in_memory`] in tests
/// and a persistent store in production.
pub struct KvAuditStorage {
    store: Arc<dyn KvStore>,
}

impl KvAuditStorage {
    /// Wrap an existing KV store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create storage over a fresh in-memory KV store (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    async fn load_entry_at(&self, key: &str) -> AuditResult<Option<LogEntry>> {
        match self.store.get(NS_ENTRIES, key).await? {
            Some(bytes) => {
                let entry = serde_json::from_slice(&bytes)
                    .map_err(|e| AuditError::SerializationError(e.to_string()))?;
                Ok(Some(entry))
            },
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for KvAuditStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAuditStorage").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuditStorage for KvAuditStorage {
    async fn upsert_kind(&self, kind: &EventKind) -> AuditResult<()> {
        let bytes = serde_json::to_vec(kind)
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;
        self.store.set(NS_KINDS, &kind.identifier, bytes).await?;
        Ok(())
    }

    async fn get_kind(&self, identifier: &str) -> AuditResult<Option<EventKind>> {
        match self.store.get(NS_KINDS, identifier).await? {
            Some(bytes) => {
                let kind = serde_json::from_slice(&bytes)
                    .map_err(|e| AuditError::SerializationError(e.to_string()))?;
                Ok(Some(kind))
            },
            None => Ok(None),
        }
    }

    async fn list_kinds(&self) -> AuditResult<Vec<EventKind>> {
        let mut kinds = Vec::new();
        for key in self.store.list_keys(NS_KINDS).await? {
            if let Some(kind) = self.get_kind(&key).await? {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    async fn store_entry(&self, entry: &LogEntry) -> AuditResult<()> {
        let key = seq_key(entry.seq);
        let bytes = serde_json::to_vec(entry)
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;
        self.store.set(NS_ENTRIES, &key, bytes).await?;
        self.store
            .set(NS_ENTRY_INDEX, &entry.id.0.to_string(), key.into_bytes())
            .await?;
        Ok(())
    }

    async fn get_entry(&self, id: &LogEntryId) -> AuditResult<Option<LogEntry>> {
        let Some(key_bytes) = self.store.get(NS_ENTRY_INDEX, &id.0.to_string()).await? else {
            return Ok(None);
        };
        let key = String::from_utf8(key_bytes)
            .map_err(|e| AuditError::StorageError(e.to_string()))?;
        self.load_entry_at(&key).await
    }

    async fn list_entries(&self) -> AuditResult<Vec<LogEntry>> {
        let mut keys = self.store.list_keys(NS_ENTRIES).await?;
        keys.sort();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.load_entry_at(&key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn delete_entry(&self, id: &LogEntryId) -> AuditResult<bool> {
        let index_key = id.0.to_string();
        let Some(key_bytes) = self.store.get(NS_ENTRY_INDEX, &index_key).await? else {
            return Ok(false);
        };
        let key = String::from_utf8(key_bytes)
            .map_err(|e| AuditError::StorageError(e.to_string()))?;
        self.store.delete(NS_ENTRIES, &key).await?;
        self.store.delete(NS_ENTRY_INDEX, &index_key).await?;
        Ok(true)
    }

    async fn detach_device(&self, device: &DeviceId) -> AuditResult<u64> {
        let mut updated: u64 = 0;
        for entry in self.list_entries().await? {
            if entry.device.as_ref().is_some_and(|d| d.id == *device) {
                let mut detached = entry;
                detached.device = None;
                self.store_entry(&detached).await?;
                updated = updated.saturating_add(1);
            }
        }
        Ok(updated)
    }

    async fn last_seq(&self) -> AuditResult<u64> {
        let keys = self.store.list_keys(NS_ENTRIES).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(seq: u64) -> LogEntry {
        LogEntry::new(
            seq,
            EventKind::new("DATA_RECEIVED", "Sensor data received"),
            None,
            None,
            json!({ "seq": seq }),
        )
    }

    #[tokio::test]
    async fn test_store_and_get_entry() {
        let storage = KvAuditStorage::in_memory();
        let e = entry(1);
        storage.store_entry(&e).await.unwrap();

        let loaded = storage.get_entry(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, e.id);
        assert_eq!(loaded.details, e.details);
    }

    #[tokio::test]
    async fn test_list_entries_in_insertion_order() {
        let storage = KvAuditStorage::in_memory();
        // Insert out of order; listing must come back by seq.
        for seq in [3u64, 1, 2] {
            storage.store_entry(&entry(seq)).await.unwrap();
        }
        let seqs: Vec<u64> = storage
            .list_entries()
            .await
            .unwrap()
            .iter()
            .map(|e| e.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let storage = KvAuditStorage::in_memory();
        let e = entry(1);
        storage.store_entry(&e).await.unwrap();
        assert!(storage.delete_entry(&e.id).await.unwrap());
        assert!(!storage.delete_entry(&e.id).await.unwrap());
        assert!(storage.get_entry(&e.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_seq() {
        let storage = KvAuditStorage::in_memory();
        assert_eq!(storage.last_seq().await.unwrap(), 0);
        storage.store_entry(&entry(7)).await.unwrap();
        storage.store_entry(&entry(4)).await.unwrap();
        assert_eq!(storage.last_seq().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_detach_device() {
        use sentra_core::Device;

        let storage = KvAuditStorage::in_memory();
        let device = Device::new("10.0.0.1".parse().unwrap());
        let mut with_device = entry(1);
        with_device.device = Some(device.clone());
        storage.store_entry(&with_device).await.unwrap();
        storage.store_entry(&entry(2)).await.unwrap();

        let updated = storage.detach_device(&device.id).await.unwrap();
        assert_eq!(updated, 1);

        let reloaded = storage.get_entry(&with_device.id).await.unwrap().unwrap();
        assert!(reloaded.device.is_none());
    }
}
