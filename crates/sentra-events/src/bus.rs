//! The event bus: publish → audit record → dispatch sinks.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sentra_audit::{AuditError, AuditLog, LogEntry};
use sentra_core::Device;
use serde_json::Value;
use tracing::{debug, error};

/// Context accompanying a published event.
#[derive(Debug, Clone, Default)]
pub struct EventInput {
    /// Acting principal, if any (e.g. an admin username).
    pub actor: Option<String>,
    /// Source device, if any.
    pub device: Option<Device>,
    /// Free-form structured details.
    pub details: Value,
    /// The domain instance that triggered the event, if any. Forwarded to
    /// immediate webhook dispatch; deferred batches reconstruct context
    /// from the log entry alone.
    pub instance: Option<Value>,
}

impl EventInput {
    /// Set the acting principal.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Set the source device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Set the details payload.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Set the triggering domain instance.
    #[must_use]
    pub fn with_instance(mut self, instance: Value) -> Self {
        self.instance = Some(instance);
        self
    }
}

/// Receiver of freshly written log entries.
///
/// The dispatch decision engine registers itself here. Implementations
/// handle their own failures; nothing they do may surface to the
/// publishing caller.
#[async_trait]
pub trait DispatchSink: Send + Sync {
    /// Called synchronously after a log entry has been written.
    async fn entry_logged(&self, entry: &LogEntry, instance: Option<&Value>);
}

/// In-process bus connecting event producers to the audit log and the
/// notification engine.
pub struct EventBus {
    log: Arc<AuditLog>,
    sinks: RwLock<Vec<Arc<dyn DispatchSink>>>,
}

impl EventBus {
    /// Create a bus writing through the given audit log.
    #[must_use]
    pub fn new(log: Arc<AuditLog>) -> Self {
        Self {
            log,
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// The audit log this bus writes through.
    #[must_use]
    pub fn log(&self) -> &Arc<AuditLog> {
        &self.log
    }

    /// Register a dispatch sink. Sinks are invoked in registration order.
    pub fn add_sink(&self, sink: Arc<dyn DispatchSink>) {
        if let Ok(mut sinks) = self.sinks.write() {
            sinks.push(sink);
        }
    }

    /// Publish an event occurrence.
    ///
    /// Resolves the identifier, writes the audit record, then hands the
    /// entry to every sink, all in the caller's task. An unknown
    /// identifier is a silent no-op; every other failure is logged and
    /// swallowed so the triggering operation (e.g. a sensor data
    /// submission) always proceeds.
    pub async fn publish(&self, identifier: &str, input: EventInput) {
        let entry = match self
            .log
            .append(identifier, input.actor, input.device, input.details)
            .await
        {
            Ok(entry) => entry,
            Err(AuditError::UnknownEvent { identifier }) => {
                debug!(identifier = %identifier, "ignoring event with uncatalogued identifier");
                return;
            },
            Err(e) => {
                error!(identifier, error = %e, "failed to write audit entry");
                return;
            },
        };

        let sinks: Vec<Arc<dyn DispatchSink>> = match self.sinks.read() {
            Ok(sinks) => sinks.clone(),
            Err(e) => {
                error!(error = %e, "sink registry poisoned; entry logged but not dispatched");
                return;
            },
        };
        for sink in sinks {
            sink.entry_logged(&entry, input.instance.as_ref()).await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
