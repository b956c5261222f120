//! Namespaced key-value store trait and implementations.
//!
//! The [`KvStore`] trait provides byte-level `get`/`set`/`delete` scoped to
//! a namespace. Two implementations:
//!
//! - [`MemoryKvStore`] (always available): for tests and ephemeral runs
//! - [`SurrealKvStore`] (behind the `kv` feature): persistent, ACID-compliant
//!
//! Namespaces keep the stores that share one backend apart: the audit log
//! writes under `audit:*`, the webhook registry under `webhooks`, the
//! scheduler under `scheduler:jobs`. The NUL byte separates namespace from
//! key internally, so neither side may contain one.

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Reject empty segments and the reserved NUL separator.
fn check_segment(what: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!(
            "{what} must not be empty"
        )));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{what} must not contain NUL bytes"
        )));
    }
    Ok(())
}

/// Raw key-value store trait.
///
/// Implementations must be thread-safe; every operation is scoped to a
/// namespace.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value. Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or key is invalid, or the backend
    /// fails.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or key is invalid, or the backend
    /// fails.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or key is invalid, or the backend
    /// fails.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is invalid or the backend fails.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory key-value store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: std::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn qualified(namespace: &str, key: &str) -> String {
        format!("{namespace}\0{key}")
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(entries.get(&Self::qualified(namespace, key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        entries.insert(Self::qualified(namespace, key), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(entries.remove(&Self::qualified(namespace, key)).is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_segment("namespace", namespace)?;
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let prefix = format!("{namespace}\0");
        Ok(entries
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SurrealKV implementation (behind `kv` feature)
// ---------------------------------------------------------------------------

/// Persistent key-value store backed by `SurrealKV`.
///
/// Embedded LSM-tree storage; every operation runs in its own transaction.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
fn backend_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a persistent store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { tree })
    }

    /// Close the store, flushing pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree
            .close()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))
    }

    fn raw_key(namespace: &str, key: &str) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(namespace.len().saturating_add(key.len()).saturating_add(1));
        buf.extend_from_slice(namespace.as_bytes());
        buf.push(0);
        buf.extend_from_slice(key.as_bytes());
        buf
    }

    /// Bounds of the namespace: every stored key is `"{ns}\0{key}"`, so the
    /// half-open range `["{ns}\0", "{ns}\x01")` covers exactly the namespace.
    fn namespace_bounds(namespace: &str) -> (Vec<u8>, Vec<u8>) {
        let mut start = Vec::with_capacity(namespace.len().saturating_add(1));
        start.extend_from_slice(namespace.as_bytes());
        start.push(0);
        let mut end = Vec::with_capacity(namespace.len().saturating_add(1));
        end.extend_from_slice(namespace.as_bytes());
        end.push(1);
        (start, end)
    }
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let raw = Self::raw_key(namespace, key);
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| backend_err(e))?;
        tx.get(&raw).map_err(|ref e| backend_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let raw = Self::raw_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| backend_err(e))?;
        tx.set(&raw, &value).map_err(|ref e| backend_err(e))?;
        tx.commit().await.map_err(|ref e| backend_err(e))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        check_segment("namespace", namespace)?;
        check_segment("key", key)?;
        let raw = Self::raw_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| backend_err(e))?;
        let existed = tx.get(&raw).map_err(|ref e| backend_err(e))?.is_some();
        if existed {
            tx.delete(&raw).map_err(|ref e| backend_err(e))?;
            tx.commit().await.map_err(|ref e| backend_err(e))?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        check_segment("namespace", namespace)?;
        let (start, end) = Self::namespace_bounds(namespace);
        let skip = start.len();

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| backend_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| backend_err(e))?;
        iter.seek_first().map_err(|ref e| backend_err(e))?;

        let mut keys = Vec::new();
        while iter.valid() {
            let raw = iter.key();
            if raw.len() > skip {
                if let Ok(key) = std::str::from_utf8(&raw[skip..]) {
                    keys.push(key.to_string());
                }
            }
            iter.next().map_err(|ref e| backend_err(e))?;
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_set_get() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_get_missing() {
        let store = MemoryKvStore::new();
        assert!(store.get("ns", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_overwrite() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"old".to_vec()).await.unwrap();
        store.set("ns", "k", b"new".to_vec()).await.unwrap();
        assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"v".to_vec()).await.unwrap();
        assert!(store.delete("ns", "k").await.unwrap());
        assert!(!store.delete("ns", "k").await.unwrap());
        assert!(store.get("ns", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation() {
        let store = MemoryKvStore::new();
        store.set("a", "k", b"1".to_vec()).await.unwrap();
        store.set("b", "k", b"2".to_vec()).await.unwrap();
        assert_eq!(store.get("a", "k").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b", "k").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_list_keys() {
        let store = MemoryKvStore::new();
        store.set("ns", "a", b"1".to_vec()).await.unwrap();
        store.set("ns", "b", b"2".to_vec()).await.unwrap();
        store.set("other", "c", b"3".to_vec()).await.unwrap();
        let mut keys = store.list_keys("ns").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_rejects_empty_namespace() {
        let store = MemoryKvStore::new();
        assert!(store.get("", "k").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_nul_in_key() {
        let store = MemoryKvStore::new();
        assert!(store.set("ns", "k\0bad", b"v".to_vec()).await.is_err());
    }

    #[cfg(feature = "kv")]
    mod surreal_kv {
        use super::*;

        fn open_store() -> (SurrealKvStore, tempfile::TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let store = SurrealKvStore::open(dir.path()).unwrap();
            (store, dir)
        }

        #[tokio::test]
        async fn test_surreal_set_get() {
            let (store, _dir) = open_store();
            store.set("ns", "k", b"v".to_vec()).await.unwrap();
            assert_eq!(store.get("ns", "k").await.unwrap(), Some(b"v".to_vec()));
        }

        #[tokio::test]
        async fn test_surreal_delete() {
            let (store, _dir) = open_store();
            store.set("ns", "k", b"v".to_vec()).await.unwrap();
            assert!(store.delete("ns", "k").await.unwrap());
            assert!(store.get("ns", "k").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_surreal_list_keys_scoped() {
            let (store, _dir) = open_store();
            store.set("ns", "a", b"1".to_vec()).await.unwrap();
            store.set("ns", "b", b"2".to_vec()).await.unwrap();
            store.set("other", "c", b"3".to_vec()).await.unwrap();
            let mut keys = store.list_keys("ns").await.unwrap();
            keys.sort();
            assert_eq!(keys, vec!["a", "b"]);
        }
    }
}
