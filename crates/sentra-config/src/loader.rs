//! Config file loading and validation.

use std::path::Path;

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::types::MonitorConfig;

/// Load configuration from a TOML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if the file cannot be read,
/// [`ConfigError::ParseError`] if it is not valid TOML for
/// [`MonitorConfig`], and [`ConfigError::Invalid`] if a field fails
/// validation.
pub fn load(path: &Path) -> ConfigResult<MonitorConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.display().to_string(),
        source,
    })?;
    let config: MonitorConfig = toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
        path: path.display().to_string(),
        source,
    })?;
    validate(&config)?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Check field constraints that serde cannot express.
fn validate(config: &MonitorConfig) -> ConfigResult<()> {
    if config.delivery.max_concurrent == 0 {
        return Err(ConfigError::Invalid(
            "delivery.max_concurrent must be at least 1".to_string(),
        ));
    }
    if config.logging.level.is_empty() {
        return Err(ConfigError::Invalid(
            "logging.level must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_file() {
        let file = write_config(
            r#"
            [delivery]
            max_concurrent = 8
            user_agent = "sentra-test/1.0"
            "#,
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.delivery.max_concurrent, 8);
        assert_eq!(config.delivery.user_agent.as_deref(), Some("sentra-test/1.0"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/sentra.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let file = write_config("delivery = \"not a table\"");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let file = write_config("[delivery]\nmax_concurrent = 0\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
