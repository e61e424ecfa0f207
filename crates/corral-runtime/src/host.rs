//! Host orchestration.
//!
//! A [`Host`] loads its configuration, initializes every registered plugin
//! through a [`PluginManager`] and keeps the resulting [`PluginSet`] until it
//! shuts down, at which point it runs the plugins' shutdown hooks.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use corral_runtime::Host;
//!
//! // Loads /etc/corral/corral.toml and CORRAL_* variables, and initializes
//! // every plugin linked into the binary.
//! let host = Host::builder().build()?;
//! host.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use corral_core::{ManagerSettings, PluginManager, PluginSet, PluginStatus, Registry};
use parking_lot::Mutex;
use tokio::signal;
use tracing::{info, warn};

use crate::config::{ConfigLoader, HostConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// A plugin host.
pub struct Host {
    config: HostConfig,
    registry: Registry,
    plugins: Mutex<Option<Arc<PluginSet>>>,
}

impl Host {
    /// Creates a host builder.
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// Creates a host from an already loaded configuration.
    ///
    /// This initializes logging from `config.logging` unless a subscriber is
    /// already installed.
    pub fn from_config(config: HostConfig, registry: Registry) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            root = %config.root.display(),
            state = %config.state.display(),
            plugins = registry.len(),
            "Host initialized from configuration"
        );

        Self {
            config,
            registry,
            plugins: Mutex::new(None),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// The plugins initialized by [`init`](Self::init), if running.
    pub fn plugins(&self) -> Option<Arc<PluginSet>> {
        self.plugins.lock().clone()
    }

    fn settings(&self) -> ManagerSettings {
        ManagerSettings {
            root: self.config.root.clone(),
            state: self.config.state.clone(),
            address: self.config.address.clone(),
            disabled_plugins: self.config.disabled_plugins.clone(),
            required_plugins: self.config.required_plugins.clone(),
            plugin_configs: self.config.plugins.clone(),
        }
    }

    /// Creates the host directories and initializes every plugin.
    pub async fn init(&self) -> RuntimeResult<Arc<PluginSet>> {
        if self.plugins.lock().is_some() {
            return Err(RuntimeError::AlreadyRunning);
        }

        create_dir(&self.config.root)?;
        create_dir(&self.config.state)?;

        let manager = PluginManager::new(self.registry.clone(), self.settings());
        let set = Arc::new(manager.init_all().await?);

        let loaded = set
            .iter()
            .filter(|p| p.status() == PluginStatus::Loaded)
            .count();
        info!(loaded, total = set.len(), "Plugins initialized");

        *self.plugins.lock() = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Runs every plugin shutdown hook.  Does nothing if not running.
    pub async fn stop(&self) {
        let Some(set) = self.plugins.lock().take() else {
            warn!("Host is not running");
            return;
        };
        info!("Stopping Corral host");
        set.close_all().await;
        info!("Host stopped");
    }

    /// Runs the host until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.init().await?;
        info!(address = %self.config.address, "Corral host is now running");

        let waited = wait_for_shutdown().await;
        self.stop().await;
        waited
    }

    /// Runs the host with a custom shutdown future.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.init().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }
}

fn create_dir(path: &Path) -> RuntimeResult<()> {
    std::fs::create_dir_all(path).map_err(|source| RuntimeError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            res = signal::ctrl_c() => {
                res.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// HostBuilder
// =============================================================================

/// Builder for creating a [`Host`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let host = Host::builder()
///     .config_file("/etc/corral/corral.toml")
///     .registry(registry)
///     .build()?;
/// ```
pub struct HostBuilder {
    config_loader: ConfigLoader,
    registry: Option<Registry>,
}

impl HostBuilder {
    /// Creates a new host builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            registry: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a programmatic base configuration.
    pub fn merge(mut self, config: HostConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `registry` instead of the link-time registrations.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Loads and validates the configuration, then builds the host.
    pub fn build(self) -> RuntimeResult<Host> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        let registry = self.registry.unwrap_or_else(Registry::from_static);
        Ok(Host::from_config(config, registry))
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}
