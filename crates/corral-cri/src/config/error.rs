//! Plugin configuration errors.

use thiserror::Error;

use super::duration::DurationError;

/// The first invalid field found in a [`PluginConfig`](super::PluginConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A deprecated runtime field and its replacement are both set.
    #[error("conflicting definitions: configuration includes both `{field}` and `runtimes[{runtime}]`")]
    ConflictingRuntime {
        /// Deprecated field.
        field: &'static str,
        /// Runtime name it maps to.
        runtime: &'static str,
    },

    /// No default runtime is named.
    #[error("`default_runtime_name` is empty")]
    MissingDefaultRuntimeName,

    /// The default runtime is not configured.
    #[error("no corresponding runtime configured in `containerd.runtimes` for `default_runtime_name = {0:?}`")]
    UnknownDefaultRuntime(String),

    /// A runtime allows all devices without dropping host devices.
    #[error(
        "runtime {0:?}: `privileged_without_host_devices_all_devices_allowed` requires `privileged_without_host_devices`"
    )]
    AllDevicesWithoutHostDevices(String),

    /// Deprecated registry mirrors are combined with `config_path`.
    #[error("`mirrors` cannot be set when `config_path` is provided")]
    MirrorsWithConfigPath,

    /// Deprecated registry TLS settings are combined with `config_path`.
    #[error("`configs.tls` cannot be set when `config_path` is provided")]
    TlsWithConfigPath,

    /// A duration field does not parse.
    #[error("invalid `{field}`: {source}")]
    InvalidDuration {
        /// Offending field.
        field: &'static str,
        /// Parser error.
        #[source]
        source: DurationError,
    },

    /// Only one half of the streaming key pair is set.
    #[error("`x509_key_pair_streaming` needs both `tls_cert_file` and `tls_key_file`, or neither")]
    IncompleteKeyPair,

    /// `max_concurrent_downloads` is zero.
    #[error("`max_concurrent_downloads` must be greater than 0")]
    NoConcurrentDownloads,

    /// A block-I/O weight is outside 10..=1000.
    #[error("block-I/O class {class:?}: weight {weight} is outside 10..=1000")]
    BlockIoWeight {
        /// Class holding the weight.
        class: String,
        /// Rejected weight.
        weight: u16,
    },
}

/// Result type for plugin configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;
