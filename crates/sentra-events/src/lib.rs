//! Sentra Events - the in-process event bus.
//!
//! Producers (API handlers, lifecycle hooks, the authentication hook) call
//! [`EventBus::publish`]; the bus resolves the event kind, writes the
//! audit record, and synchronously hands the new entry to every registered
//! [`DispatchSink`], all within the caller's task.
//!
//! # The publish boundary
//!
//! Publishing must never abort the operation that triggered it. An unknown
//! identifier is a silent no-op; any other failure (storage, downstream
//! dispatch) is logged and swallowed. Nothing observable propagates to the
//! caller.
//!
//! Also here: [`DosGuard`], the per-address suppression wrapper that keeps
//! repeated throttling violations from flooding the log with
//! `DOS_DETECTED` entries.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod dos;

pub use bus::{DispatchSink, EventBus, EventInput};
pub use dos::{DOS_SUPPRESSION_WINDOW, DosGuard};
