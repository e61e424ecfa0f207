//! Corral Runtime - host layer of the Corral container runtime.
//!
//! This crate provides:
//! - Configuration loading and validation (`config`)
//! - Logging setup (`logging`) and the secondary verbosity bridge (`verbosity`)
//! - The in-process runtime client plugins use to reach core services (`client`)
//! - Host orchestration: directories, plugin initialization, shutdown (`Host`)
//!
//! ```ignore
//! use corral_runtime::Host;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Every plugin crate linked into the binary registers itself.
//!     let host = Host::builder().build()?;
//!
//!     // Run until Ctrl+C or SIGTERM
//!     host.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod verbosity;

// Re-exports
pub use client::{Client, ClientBuilder, ClientError, EVENT_EXCHANGE, REQUIRED_SERVICES};
pub use config::{ConfigError, ConfigLoader, ConfigResult, HostConfig, LogLevel, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use host::{Host, HostBuilder};
pub use logging::LoggingBuilder;
pub use verbosity::{LogBridgeError, SharedVerbosity, VerbositySink, bridge_verbosity};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
