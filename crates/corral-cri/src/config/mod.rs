//! Configuration of the CRI plugin.
//!
//! [`PluginConfig`] is the plugin's own section of the host configuration.
//! It is checked with [`validate_plugin_config`] and then combined with the
//! directories the host assigned into a [`Config`], which is what the CRI
//! services are built from.

pub mod duration;
pub mod error;
pub mod schema;
pub mod validation;

pub use duration::{DurationError, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use schema::{
    AuthConfig, BlockIoClass, BlockIoConfig, BlockIoDevice, CniConfig, Config, ContainerdConfig,
    Mirror, PluginConfig, RUNTIME_DEFAULT, RUNTIME_UNTRUSTED, RegistryConfig, RegistryHostConfig,
    Runtime, TlsConfig, X509KeyPairStreaming,
};
pub use validation::validate_plugin_config;
