//! Configuration module for the Corral host.
//!
//! This module provides TOML/env based configuration loading and validation
//! for the host directories, plugin selection, per-plugin sections and
//! logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{HostConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig};
pub use validation::validate_config;
