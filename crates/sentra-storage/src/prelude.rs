//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_storage::prelude::*;` to import all essential types.

// Errors
pub use crate::{StorageError, StorageResult};

// Durable KV storage
pub use crate::{KvStore, MemoryKvStore};

#[cfg(feature = "kv")]
pub use crate::SurrealKvStore;

// Expiring cache
pub use crate::TtlCache;
