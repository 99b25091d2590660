//! Configuration management for v2c
//!
//! Settings are loaded from environment variables with sensible defaults.
//! Command-line flags override the values they cover.
//!
//! # Environment Variables
//!
//! - `V2C_LOG_LEVEL`: Logging level - default: "info"
//! - `V2C_LOG_JSON`: Emit JSON log lines (true|false) - default: "false"
//! - `V2C_TRANSPORT_VOLUME`: Name of the transport volume - default: "v2c-transport"
//! - `V2C_MAX_WORKERS`: Bound on concurrently running detectives/provisioners -
//!   default: unset (one worker per component)
//! - `V2C_DOCKER_TIMEOUT`: Docker API timeout in seconds - default: "120"
//! - `V2C_PRODUCT_NAME`: Product name stamped into image labels - default: "v2c"
//!
//! # Example
//!
//! ```no_run
//! use v2c::V2cConfig;
//!
//! let config = V2cConfig::from_env().expect("Invalid configuration");
//! config.validate().expect("Invalid configuration");
//! println!("transport volume: {}", config.transport_volume);
//! ```

use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TRANSPORT_VOLUME: &str = "v2c-transport";
const DEFAULT_DOCKER_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PRODUCT_NAME: &str = "v2c";
const MAX_WORKERS_LIMIT: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone)]
pub struct V2cConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_json: bool,

    /// Docker volume shared by the packager, detectives and provisioners
    pub transport_volume: String,

    /// `None` starts one worker per component at once
    pub max_workers: Option<usize>,

    pub docker_timeout_secs: u64,

    pub product_name: String,
}

impl Default for V2cConfig {
    /// Built-in defaults, ignoring the environment
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            transport_volume: DEFAULT_TRANSPORT_VOLUME.to_string(),
            max_workers: None,
            docker_timeout_secs: DEFAULT_DOCKER_TIMEOUT_SECS,
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
        }
    }
}

impl V2cConfig {
    /// Load from `V2C_*` environment variables, falling back to defaults.
    ///
    /// A numeric variable that is set but unparseable is an error rather than
    /// a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_level = env::var("V2C_LOG_LEVEL")
            .unwrap_or(defaults.log_level)
            .to_lowercase();

        let log_json = env::var("V2C_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.log_json);

        let transport_volume = env::var("V2C_TRANSPORT_VOLUME")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.transport_volume);

        let max_workers = match env::var("V2C_MAX_WORKERS") {
            Ok(v) if !v.is_empty() => Some(Self::parse_max_workers(&v)?),
            _ => defaults.max_workers,
        };

        let docker_timeout_secs = match env::var("V2C_DOCKER_TIMEOUT") {
            Ok(v) if !v.is_empty() => v.parse::<u64>().map_err(|e| ConfigError::ParseError {
                field: "docker_timeout".to_string(),
                error: e.to_string(),
            })?,
            _ => defaults.docker_timeout_secs,
        };

        let product_name = env::var("V2C_PRODUCT_NAME")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.product_name);

        Ok(Self {
            log_level,
            log_json,
            transport_volume,
            max_workers,
            docker_timeout_secs,
            product_name,
        })
    }

    /// Checks numeric ranges, the log level and the volume name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.docker_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Docker timeout must be at least 1 second".to_string(),
            ));
        }
        if self.docker_timeout_secs > 3600 {
            return Err(ConfigError::ValidationFailed(
                "Docker timeout cannot exceed 1 hour".to_string(),
            ));
        }

        if let Some(workers) = self.max_workers {
            if workers == 0 || workers > MAX_WORKERS_LIMIT {
                return Err(ConfigError::ValidationFailed(format!(
                    "Max workers must be between 1 and {}",
                    MAX_WORKERS_LIMIT
                )));
            }
        }

        if !self
            .transport_volume
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid transport volume name: {}",
                self.transport_volume
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout_secs)
    }

    /// Parse a `--max-workers` style value
    pub fn parse_max_workers(value: &str) -> Result<usize, ConfigError> {
        value
            .parse::<usize>()
            .map_err(|e| ConfigError::ParseError {
                field: "max_workers".to_string(),
                error: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "V2C_LOG_LEVEL",
            "V2C_LOG_JSON",
            "V2C_TRANSPORT_VOLUME",
            "V2C_MAX_WORKERS",
            "V2C_DOCKER_TIMEOUT",
            "V2C_PRODUCT_NAME",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = V2cConfig::from_env().unwrap();
        assert_eq!(config.transport_volume, V2cConfig::default().transport_volume);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.transport_volume, "v2c-transport");
        assert_eq!(config.max_workers, None);
        assert_eq!(config.docker_timeout(), Duration::from_secs(120));
        assert_eq!(config.product_name, "v2c");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("V2C_LOG_LEVEL", "DEBUG");
        env::set_var("V2C_TRANSPORT_VOLUME", "my-volume");
        env::set_var("V2C_MAX_WORKERS", "4");
        env::set_var("V2C_DOCKER_TIMEOUT", "30");

        let config = V2cConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.transport_volume, "my-volume");
        assert_eq!(config.max_workers, Some(4));
        assert_eq!(config.docker_timeout_secs, 30);
        assert!(config.validate().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_validation_failures() {
        let base = V2cConfig::default();

        let config = V2cConfig {
            docker_timeout_secs: 0,
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = V2cConfig {
            max_workers: Some(0),
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = V2cConfig {
            transport_volume: "bad/name".to_string(),
            ..base.clone()
        };
        assert!(config.validate().is_err());

        let config = V2cConfig {
            log_level: "loud".to_string(),
            ..base
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_malformed_numbers_rejected() {
        clear_env();
        env::set_var("V2C_MAX_WORKERS", "abc");
        match V2cConfig::from_env() {
            Err(ConfigError::ParseError { field, .. }) => assert_eq!(field, "max_workers"),
            other => panic!("Expected ParseError, got {:?}", other),
        }

        clear_env();
        env::set_var("V2C_DOCKER_TIMEOUT", "soon");
        assert!(matches!(
            V2cConfig::from_env(),
            Err(ConfigError::ParseError { .. })
        ));
        clear_env();
    }

    #[test]
    fn test_parse_max_workers() {
        assert_eq!(V2cConfig::parse_max_workers("8").unwrap(), 8);
        assert!(matches!(
            V2cConfig::parse_max_workers("many"),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
