//! Logging configuration and subscriber installation.

use tracing_subscriber::EnvFilter;

use crate::error::{TelemetryError, TelemetryResult};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-oriented output with source locations.
    Pretty,
    /// Single-line human-oriented output.
    #[default]
    Compact,
    /// Newline-delimited JSON, for log shippers.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::InvalidFilter(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

/// Logging configuration.
///
/// The default level applies to every crate; directives override it per
/// target (e.g. `"sentra_webhooks=debug"`). The `RUST_LOG` environment
/// variable, when set, wins over both.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    level: String,
    /// Output format.
    format: LogFormat,
    /// Per-target level directives.
    directives: Vec<String>,
}

impl LogConfig {
    /// Create a config with the given default level.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            directives: Vec::new(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a per-target directive, e.g. `"sentra_scheduler=trace"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        let mut spec = self.level.clone();
        for directive in &self.directives {
            spec.push(',');
            spec.push_str(directive);
        }
        EnvFilter::try_new(&spec).map_err(|e| TelemetryError::InvalidFilter(e.to_string()))
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Install the global tracing subscriber from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for an unparsable filter and
/// [`TelemetryError::AlreadyInitialized`] if a subscriber is already
/// installed.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    // RUST_LOG, when present, wins over the configured filter.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// Install a subscriber with default settings (`info`, compact).
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInitialized`] if a subscriber is
/// already installed.
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parses() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("fancy".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_filter_includes_directives() {
        let config = LogConfig::new("warn").with_directive("sentra_events=debug");
        // Filter construction must succeed; its rendering is an EnvFilter detail.
        assert!(config.filter().is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LogConfig::new("shouty[");
        assert!(config.filter().is_err());
    }
}
