//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sentra_events::prelude::*;` to import all essential types.

// Bus
pub use crate::{DispatchSink, EventBus, EventInput};

// DoS suppression
pub use crate::{DOS_SUPPRESSION_WINDOW, DosGuard};
