//! Structured logging setup for v2c
//!
//! Initializes the `tracing` subscriber: pretty console output by default,
//! JSON lines for production, `RUST_LOG` filtering on top. Initialization
//! happens once per process.
//!
//! # Example
//!
//! ```no_run
//! use v2c::util::{init_logging, LoggingConfig};
//! use tracing::{info, Level};
//!
//! init_logging(LoggingConfig::with_level(Level::DEBUG));
//! info!(image = "acme/app:1", "Starting build");
//! ```

use crate::config::V2cConfig;
use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Controls the minimum level, output format and metadata of log lines
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,

    /// Use JSON output format (for structured logging in production)
    pub use_json: bool,

    /// Include the module target (e.g., v2c::workflow) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Include thread ID and name in logs
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full metadata
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }
}

/// Parses a log level, case-insensitive. Unknown values fall back to INFO.
///
/// ```
/// use v2c::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("invalid"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn with_directive(filter: EnvFilter, directive: &str) -> EnvFilter {
    match directive.parse() {
        Ok(d) => filter.add_directive(d),
        Err(_) => filter,
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut filter = with_directive(
            EnvFilter::from_default_env(),
            &format!("v2c={}", config.level),
        );

        if env::var("RUST_LOG").is_err() {
            for noisy in ["h2=warn", "hyper=warn", "hyper_util=warn", "bollard=warn"] {
                filter = with_directive(filter, noisy);
            }
        }

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids)
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    });
}

impl From<&V2cConfig> for LoggingConfig {
    fn from(config: &V2cConfig) -> Self {
        let level = parse_level(&config.log_level);
        if config.log_json {
            LoggingConfig {
                level,
                ..LoggingConfig::production()
            }
        } else {
            LoggingConfig::with_level(level)
        }
    }
}

/// Initializes logging from `V2C_LOG_LEVEL` / `V2C_LOG_JSON` as loaded into `config`
pub fn init_from_config(config: &V2cConfig) {
    init_logging(LoggingConfig::from(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
        assert!(config.include_target);
        assert!(!config.include_location);
    }

    #[test]
    fn test_production_config() {
        let config = LoggingConfig::production();
        assert!(config.use_json);
        assert!(config.include_location);
        assert!(config.include_thread_ids);
    }

    #[test]
    fn test_config_from_v2c_config() {
        let config = V2cConfig {
            log_level: "warn".to_string(),
            log_json: true,
            ..V2cConfig::default()
        };
        let logging = LoggingConfig::from(&config);
        assert_eq!(logging.level, Level::WARN);
        assert!(logging.use_json);
        assert!(logging.include_location);

        let logging = LoggingConfig::from(&V2cConfig::default());
        assert_eq!(logging.level, Level::INFO);
        assert!(!logging.use_json);
    }
}
