//! Sentra Storage - persistence layer for the monitoring backend.
//!
//! Two kinds of state live here:
//!
//! # Durable key-value storage ([`KvStore`])
//!
//! Namespaced byte-level `get`/`set`/`delete`, backed either by an
//! in-memory map (tests, ephemeral runs) or by **`SurrealKV`**, an
//! embedded, ACID-compliant LSM-tree store (behind the **`kv`** feature).
//! The audit log, the webhook registry, and the scheduler's job records
//! all persist through this trait.
//!
//! # Expiring cache ([`TtlCache`])
//!
//! A shared in-process cache whose entries carry a time-to-live. The
//! webhook rate limiter keeps its pending queues and dispatch-scheduled
//! markers here, and the DoS-notification guard keeps its suppression
//! keys here. Correctness of the rate limiter rests on three atomic
//! primitives this cache provides: list append with TTL refresh
//! ([`TtlCache::push_json`]), set-if-absent ([`TtlCache::set_if_absent`]),
//! and read-and-clear ([`TtlCache::take_json`]).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod cache;
mod error;
mod kv;

pub use cache::TtlCache;
pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
