//! Runtime error types.

use corral_core::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during host operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Plugin initialization failed as a whole.
    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// A host directory could not be created.
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        /// Directory being created.
        path: std::path::PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Shutdown signal handlers could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),

    /// The host is already running.
    #[error("Host is already running")]
    AlreadyRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
