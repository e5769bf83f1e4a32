//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result};
use std::path::Path;

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from a file path or use defaults
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(String::from).or_else(find_config_file);

        let schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };
        schema.validate()?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Load with defaults only (no file)
    pub fn defaults() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<String> {
    let candidates = ["slimsnap.toml", ".slimsnap.toml", ".config/slimsnap.toml"];

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }

    None
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &str) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path, e)).with_source(e)
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::from(e).with_context(format!("While parsing config file {}", path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert!(config.path.is_none());
        assert_eq!(config.schema.freemium.max_quality, 80);
    }

    #[test]
    fn test_config_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[usage]\nmax_daily_processing = 25\n[telemetry]\nlog_level = \"debug\"").unwrap();

        let config = Config::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.schema.usage.max_daily_processing, 25);
        assert_eq!(config.schema.usage.max_processing_per_session, 3);
        assert_eq!(config.schema.telemetry.log_level, "debug");
    }

    #[test]
    fn test_config_load_missing_explicit_file() {
        let err = Config::load(Some("/nonexistent/slimsnap.toml")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[freemium\nmax_images = ").unwrap();

        let err = Config::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_config_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[freemium]\nmax_images = 0").unwrap();

        let err = Config::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigValidationError);
    }
}
