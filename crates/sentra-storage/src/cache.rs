//! Shared expiring cache.
//!
//! [`TtlCache`] holds serialized values with an optional time-to-live, all
//! behind one lock, which makes each operation atomic with respect to the
//! others. The webhook rate limiter depends on exactly that: its
//! queue-then-lock sequence is built from [`push_json`](TtlCache::push_json)
//! (append with TTL refresh), [`set_if_absent`](TtlCache::set_if_absent)
//! (the dispatch-scheduled marker), and [`take_json`](TtlCache::take_json)
//! (read-and-clear at dispatch time). Expired entries are dropped lazily on
//! access.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};

#[derive(Debug)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache with per-entry time-to-live and atomic operations.
#[derive(Debug, Default)]
pub struct TtlCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl TtlCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get and deserialize a value. Returns `None` for missing or expired
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored bytes do not
    /// deserialize as `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let now = Instant::now();
        let slots = self
            .slots
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        match slots.get(key) {
            Some(slot) if !slot.is_expired(now) => {
                let value = serde_json::from_slice(&slot.value)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            },
            _ => Ok(None),
        }
    }

    /// Serialize and store a value, replacing any existing entry.
    ///
    /// `ttl = None` stores the value without expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the value does not
    /// serialize.
    pub fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        slots.insert(
            key.to_string(),
            Slot {
                value: bytes,
                expires_at: ttl.map(|d| Instant::now().checked_add(d).unwrap_or_else(Instant::now)),
            },
        );
        Ok(())
    }

    /// Set a marker key only if it is absent (or expired).
    ///
    /// Returns `true` if the marker was acquired by this call. This is the
    /// test-and-set primitive behind the dispatch-scheduled marker.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the cache lock is poisoned.
    pub fn set_if_absent(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        let now = Instant::now();
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        if let Some(slot) = slots.get(key) {
            if !slot.is_expired(now) {
                return Ok(false);
            }
        }
        slots.insert(
            key.to_string(),
            Slot {
                value: b"1".to_vec(),
                expires_at: Some(now.checked_add(ttl).unwrap_or(now)),
            },
        );
        Ok(true)
    }

    /// Append an item to the JSON list stored under `key`, creating the
    /// list if absent, and reset the entry's TTL.
    ///
    /// Returns the new list length. The TTL refresh keeps a queue alive as
    /// long as items keep arriving.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the existing value is not
    /// a list of `T` or the item does not serialize.
    pub fn push_json<T: Serialize>(
        &self,
        key: &str,
        item: &T,
        ttl: Duration,
    ) -> StorageResult<usize> {
        let now = Instant::now();
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let mut list: Vec<serde_json::Value> = match slots.get(key) {
            Some(slot) if !slot.is_expired(now) => serde_json::from_slice(&slot.value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            _ => Vec::new(),
        };
        list.push(
            serde_json::to_value(item).map_err(|e| StorageError::Serialization(e.to_string()))?,
        );
        let len = list.len();
        let bytes =
            serde_json::to_vec(&list).map_err(|e| StorageError::Serialization(e.to_string()))?;
        slots.insert(
            key.to_string(),
            Slot {
                value: bytes,
                expires_at: Some(now.checked_add(ttl).unwrap_or(now)),
            },
        );
        Ok(len)
    }

    /// Atomically read and remove a value.
    ///
    /// Returns `None` for missing or expired keys. Used by the batch
    /// dispatcher to drain a pending queue without losing concurrent
    /// appends: an append either lands before the take (and is drained) or
    /// after it (and starts a fresh queue).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored bytes do not
    /// deserialize as `T`.
    pub fn take_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let now = Instant::now();
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        match slots.remove(key) {
            Some(slot) if !slot.is_expired(now) => {
                let value = serde_json::from_slice(&slot.value)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            },
            _ => Ok(None),
        }
    }

    /// Remove a key. Returns `true` if a live entry was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the cache lock is poisoned.
    pub fn delete(&self, key: &str) -> StorageResult<bool> {
        let now = Instant::now();
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        match slots.remove(key) {
            Some(slot) => Ok(!slot.is_expired(now)),
            None => Ok(false),
        }
    }

    /// Drop every expired entry. Callers may run this periodically; all
    /// read paths already ignore expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the cache lock is poisoned.
    pub fn purge_expired(&self) -> StorageResult<usize> {
        let now = Instant::now();
        let mut slots = self
            .slots
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_expired(now));
        Ok(before.saturating_sub(slots.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(30);
    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_set_get_round_trip() {
        let cache = TtlCache::new();
        cache.set_json("k", &vec![1u32, 2, 3], Some(LONG)).unwrap();
        let v: Option<Vec<u32>> = cache.get_json("k").unwrap();
        assert_eq!(v, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_get_missing() {
        let cache = TtlCache::new();
        let v: Option<String> = cache.get_json("missing").unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_expiry() {
        let cache = TtlCache::new();
        cache.set_json("k", &"v", Some(SHORT)).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        let v: Option<String> = cache.get_json("k").unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let cache = TtlCache::new();
        cache.set_json("k", &"v", None).unwrap();
        std::thread::sleep(Duration::from_millis(40));
        let v: Option<String> = cache.get_json("k").unwrap();
        assert_eq!(v.as_deref(), Some("v"));
    }

    #[test]
    fn test_set_if_absent_acquires_once() {
        let cache = TtlCache::new();
        assert!(cache.set_if_absent("lock", LONG).unwrap());
        assert!(!cache.set_if_absent("lock", LONG).unwrap());
    }

    #[test]
    fn test_set_if_absent_reacquires_after_expiry() {
        let cache = TtlCache::new();
        assert!(cache.set_if_absent("lock", SHORT).unwrap());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.set_if_absent("lock", LONG).unwrap());
    }

    #[test]
    fn test_push_accumulates_and_take_clears() {
        let cache = TtlCache::new();
        assert_eq!(cache.push_json("q", &"a".to_string(), LONG).unwrap(), 1);
        assert_eq!(cache.push_json("q", &"b".to_string(), LONG).unwrap(), 2);

        let drained: Option<Vec<String>> = cache.take_json("q").unwrap();
        assert_eq!(drained, Some(vec!["a".to_string(), "b".to_string()]));

        let empty: Option<Vec<String>> = cache.take_json("q").unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn test_push_refreshes_ttl() {
        let cache = TtlCache::new();
        cache.push_json("q", &1u32, SHORT).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        cache.push_json("q", &2u32, LONG).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let v: Option<Vec<u32>> = cache.get_json("q").unwrap();
        assert_eq!(v, Some(vec![1, 2]));
    }

    #[test]
    fn test_delete() {
        let cache = TtlCache::new();
        cache.set_json("k", &"v", Some(LONG)).unwrap();
        assert!(cache.delete("k").unwrap());
        assert!(!cache.delete("k").unwrap());
    }

    #[test]
    fn test_purge_expired() {
        let cache = TtlCache::new();
        cache.set_json("dead", &1u32, Some(SHORT)).unwrap();
        cache.set_json("live", &2u32, Some(LONG)).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.purge_expired().unwrap(), 1);
        let v: Option<u32> = cache.get_json("live").unwrap();
        assert_eq!(v, Some(2));
    }
}
