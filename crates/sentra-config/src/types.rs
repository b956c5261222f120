//! Configuration types.
//!
//! Every struct implements [`Default`] with production defaults, and every
//! section carries `#[serde(default)]` so partial files deserialize.

use serde::{Deserialize, Serialize};

/// Root configuration for the monitoring backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sensor reporting cadence and server-side throttling.
    pub sensor: SensorSection,
    /// Audit log and device retention.
    pub retention: RetentionSection,
    /// Outbound webhook delivery limits.
    pub delivery: DeliverySection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

/// Sensor reporting cadence and server-side throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    /// Period in seconds at which sensors are told to report.
    pub report_period_seconds: u64,
    /// Minimum seconds between submissions from one address. `0` disables
    /// throttling.
    pub throttle_window_seconds: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            report_period_seconds: 30,
            throttle_window_seconds: 5,
        }
    }
}

/// Audit log and device retention knobs.
///
/// `None` (or `0`) disables the corresponding pruning stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSection {
    /// Delete log entries older than this many days.
    pub log_max_age_days: Option<u32>,
    /// Keep at most this many log entries, oldest deleted first.
    pub log_max_count: Option<u64>,
    /// Delete devices idle for more than this many days.
    pub device_max_idle_days: Option<u32>,
    /// When a device is pruned, also delete its log entries. When `false`,
    /// the entries are kept and detached from the device instead.
    pub delete_device_entries: bool,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            log_max_age_days: Some(90),
            log_max_count: Some(100_000),
            device_max_idle_days: Some(180),
            delete_device_entries: true,
        }
    }
}

/// Outbound webhook delivery limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySection {
    /// Maximum concurrently running deliveries.
    pub max_concurrent: usize,
    /// Override for the default `User-Agent` request header.
    pub user_agent: Option<String>,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            max_concurrent: 64,
            user_agent: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format (`pretty`, `compact`, `json`).
    pub format: String,
    /// Per-target directives, e.g. `"sentra_webhooks=debug"`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.sensor.report_period_seconds, 30);
        assert_eq!(config.retention.log_max_age_days, Some(90));
        assert_eq!(config.retention.log_max_count, Some(100_000));
        assert!(config.retention.delete_device_entries);
        assert_eq!(config.delivery.max_concurrent, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [sensor]
            throttle_window_seconds = 0

            [retention]
            device_max_idle_days = 365
            "#,
        )
        .unwrap();
        assert_eq!(config.sensor.throttle_window_seconds, 0);
        assert_eq!(config.sensor.report_period_seconds, 30);
        assert_eq!(config.retention.device_max_idle_days, Some(365));
        assert_eq!(config.retention.log_max_count, Some(100_000));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(config.delivery.max_concurrent, 64);
    }
}
