//! Suppression guard for throttling-violation events.
//!
//! The request throttle reports every rejected submission. Without
//! suppression a flood from one address would mint a `DOS_DETECTED` entry
//! (and webhook notification) per rejected request. The guard keys a
//! cache marker per address so at most one entry is written per address
//! per window.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use sentra_audit::DeviceStore;
use sentra_storage::TtlCache;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bus::{EventBus, EventInput};

/// How long repeated violations from one address stay silent.
pub const DOS_SUPPRESSION_WINDOW: Duration = Duration::from_secs(300);

/// Per-address suppression for `DOS_DETECTED` events.
pub struct DosGuard {
    bus: Arc<EventBus>,
    devices: Arc<DeviceStore>,
    cache: Arc<TtlCache>,
}

impl DosGuard {
    /// Create a guard over the shared cache.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, devices: Arc<DeviceStore>, cache: Arc<TtlCache>) -> Self {
        Self {
            bus,
            devices,
            cache,
        }
    }

    /// Report a throttling violation from `ip`.
    ///
    /// Publishes a `DOS_DETECTED` event for the first violation per
    /// address per window; later ones within the window are dropped
    /// silently. Never fails: this runs on request-rejection paths that
    /// must stay cheap and infallible.
    pub async fn report(&self, ip: IpAddr, details: Value) {
        let key = format!("dos:{ip}");
        match self.cache.set_if_absent(&key, DOS_SUPPRESSION_WINDOW) {
            Ok(true) => {},
            Ok(false) => {
                debug!(%ip, "suppressing repeated DoS notification");
                return;
            },
            Err(e) => {
                warn!(%ip, error = %e, "DoS suppression cache unavailable; reporting anyway");
            },
        }

        // A pseudo-device gives the notification a stable subject even for
        // addresses that never submitted valid data.
        let device = match self.devices.observe(ip).await {
            Ok(device) => Some(device),
            Err(e) => {
                warn!(%ip, error = %e, "could not register device for DoS report");
                None
            },
        };

        let mut input = EventInput::default().with_details(details);
        if let Some(device) = device {
            input = input.with_device(device);
        }
        self.bus.publish("DOS_DETECTED", input).await;
    }
}

impl std::fmt::Debug for DosGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DosGuard").finish_non_exhaustive()
    }
}
