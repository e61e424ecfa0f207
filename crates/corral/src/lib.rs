//! # Corral
//!
//! A pluggable container runtime host and its Kubernetes CRI plugin.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌───────────────┐     ┌──────────────────────────────┐
//! │   Host   │────▶│ PluginManager │────▶│ io.corral.event.v1.exchange  │
//! │ (config, │     │  (dependency  │────▶│ io.corral.service.v1.*       │
//! │ logging) │     │    order)     │────▶│ io.corral.nri.v1.nri         │
//! └──────────┘     └───────────────┘────▶│ io.corral.grpc.v1.cri        │──▶ CRI service
//!                                        └──────────────────────────────┘
//! ```
//!
//! - **Host** (`corral-runtime`): loads `corral.toml`, sets up logging,
//!   creates the root and state directories and drives plugin startup and
//!   shutdown.
//! - **Plugins** (`corral-core`): static registrations, initialized once in
//!   dependency order, each with its own directories and configuration.
//! - **CRI** (`corral-cri`): validates its configuration, builds a runtime
//!   client in the `k8s.io` namespace and runs the sandbox-mode or
//!   legacy-mode CRI service.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use corral::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RuntimeError> {
//!     let host = Host::builder().config_file("/etc/corral/corral.toml").build()?;
//!     host.run().await
//! }
//! ```
//!
//! ## Features
//!
//! - `json-log`: JSON log output

pub use corral_core as core;
pub use corral_cri as cri;
pub use corral_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use corral::prelude::*;
/// ```
pub mod prelude {
    // Host - main entry point
    pub use corral_runtime::{Host, HostBuilder, HostConfig, RuntimeError};

    // Plugin model
    pub use corral_core::{
        BoxError, BoxFuture, InitContext, Instance, PluginType, Registration, Registry,
        SkipPlugin,
    };

    // CRI plugin
    pub use corral_cri::{CriService, NriApi, ServiceMode};

    // Logging
    pub use corral_runtime::prelude::*;
}
