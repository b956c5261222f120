//! The template rendering context.

use sentra_audit::{EventKind, LogEntry};
use sentra_core::Device;
use serde::Serialize;
use serde_json::Value;

/// Variables available to a webhook body template.
///
/// Reconstructed from the log entry, so immediate and deferred dispatch
/// render against the same fields; only `instance` (the original
/// triggering domain object) is exclusive to the immediate path.
#[derive(Debug, Clone, Serialize)]
pub struct EventContext {
    /// The event kind (`event.identifier`, `event.name`).
    pub event: EventKind,
    /// The acting principal, if any.
    pub user: Option<String>,
    /// The source device, if any.
    pub device: Option<Device>,
    /// The entry's structured details.
    pub details: Value,
    /// The entry's timestamp, RFC 3339.
    pub timestamp: String,
    /// The triggering domain instance (immediate dispatch only).
    pub instance: Option<Value>,
}

impl EventContext {
    /// Build the context for a log entry.
    #[must_use]
    pub fn from_entry(entry: &LogEntry, instance: Option<&Value>) -> Self {
        Self {
            event: entry.event.clone(),
            user: entry.actor.clone(),
            device: entry.device.clone(),
            details: entry.details.clone(),
            timestamp: entry.timestamp.to_rfc3339(),
            instance: instance.cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_serializes_expected_fields() {
        let context = EventContext {
            event: EventKind::new("NEW_DEVICE", "New device registered"),
            user: None,
            device: Some(Device::new("10.0.0.9".parse().unwrap())),
            details: json!({ "ip_address": "10.0.0.9" }),
            timestamp: "2026-03-01T12:00:00+00:00".to_string(),
            instance: None,
        };

        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(value["event"]["identifier"], "NEW_DEVICE");
        assert_eq!(value["device"]["ip_address"], "10.0.0.9");
        assert_eq!(value["user"], Value::Null);
        assert_eq!(value["details"]["ip_address"], "10.0.0.9");
    }
}
