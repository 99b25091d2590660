//! Utility modules for v2c

pub mod logging;

pub use logging::{init_from_config, init_logging, parse_level, LoggingConfig};
