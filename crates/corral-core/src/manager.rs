//! Plugin initialization scheduling.
//!
//! [`PluginManager`] owns a [`Registry`] and the host-wide settings plugins
//! are initialized with.  [`init_all`](PluginManager::init_all):
//!
//! - orders registrations by their `requires` edges (see [`Registry::ordered`]);
//! - records plugins listed in `disabled_plugins` as disabled without calling
//!   their init function;
//! - initializes every other plugin **sequentially**, handing it an
//!   [`InitContext`] with its own `<root>/<uri>` and `<state>/<uri>`
//!   directories, its configuration and a snapshot of the plugins processed
//!   before it;
//! - records each outcome in the returned [`PluginSet`].  A plugin returning
//!   [`SkipPlugin`] is skipped, any other error marks it failed.  Neither stops
//!   startup unless the plugin is listed in `required_plugins`.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = PluginManager::new(Registry::from_static(), settings);
//! let plugins = manager.init_all().await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::context::InitContext;
use crate::error::{PluginError, PluginResult, SkipPlugin};
use crate::plugin::{Meta, Registration};
use crate::registry::Registry;
use crate::set::{LoadedPlugin, PluginSet};

/// Host-wide settings applied to every plugin.
#[derive(Debug, Clone, Default)]
pub struct ManagerSettings {
    /// Parent of every plugin root directory.
    pub root: PathBuf,
    /// Parent of every plugin state directory.
    pub state: PathBuf,
    /// Host communication endpoint.
    pub address: String,
    /// URIs of plugins that must not be initialized.
    pub disabled_plugins: Vec<String>,
    /// URIs of plugins whose failure aborts startup.
    pub required_plugins: Vec<String>,
    /// User configuration sections keyed by plugin URI.
    pub plugin_configs: HashMap<String, Value>,
}

/// Drives plugin initialization for one host.
#[derive(Debug)]
pub struct PluginManager {
    registry: Registry,
    settings: ManagerSettings,
}

impl PluginManager {
    /// Creates a manager over `registry`.
    pub fn new(registry: Registry, settings: ManagerSettings) -> Self {
        Self { registry, settings }
    }

    /// The registry being initialized.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Initializes every registered plugin in dependency order.
    ///
    /// # Errors
    ///
    /// - [`PluginError::DependencyCycle`] when the registrations cannot be
    ///   ordered; no init function is called.
    /// - [`PluginError::RequiredFailed`] as soon as a required plugin is
    ///   disabled, skipped or fails, or when a required plugin was never
    ///   registered.
    pub async fn init_all(&self) -> PluginResult<PluginSet> {
        let order = self.registry.ordered()?;
        let disabled: HashSet<&str> = self
            .settings
            .disabled_plugins
            .iter()
            .map(String::as_str)
            .collect();
        let required: HashSet<&str> = self
            .settings
            .required_plugins
            .iter()
            .map(String::as_str)
            .collect();

        let mut set = PluginSet::new();

        for registration in order {
            let uri = registration.uri();

            let loaded = if disabled.contains(uri.as_str()) {
                info!(plugin = %uri, "Plugin disabled, skipping init");
                LoadedPlugin::new(
                    registration.plugin_type,
                    registration.id,
                    Meta::default(),
                    Err(PluginError::Disabled { uri: uri.clone() }),
                )
            } else {
                self.init_one(&registration, &uri, &set).await
            };

            if required.contains(uri.as_str())
                && let Err(err) = loaded.outcome()
            {
                return Err(PluginError::RequiredFailed {
                    uri,
                    reason: err.to_string(),
                });
            }

            set.insert(loaded);
        }

        for uri in &self.settings.required_plugins {
            if !set.iter().any(|p| &p.uri() == uri) {
                return Err(PluginError::RequiredFailed {
                    uri: uri.clone(),
                    reason: "plugin is not registered".into(),
                });
            }
        }

        Ok(set)
    }

    async fn init_one(&self, registration: &Registration, uri: &str, set: &PluginSet) -> LoadedPlugin {
        let config = registration.effective_config(self.settings.plugin_configs.get(uri));
        let ic = InitContext::builder(registration.plugin_type, registration.id)
            .root(self.settings.root.join(uri))
            .state(self.settings.state.join(uri))
            .address(self.settings.address.clone())
            .config(config)
            .plugins(Arc::new(set.clone()))
            .build();

        info!(plugin = %uri, "Loading plugin");
        let result = (registration.init)(ic.clone()).await;

        let outcome = match result {
            Ok(instance) => {
                info!(plugin = %uri, instance = %instance.type_name(), "Plugin initialized");
                Ok(instance)
            }
            Err(err) => match err.downcast_ref::<SkipPlugin>() {
                Some(skip) => {
                    info!(plugin = %uri, reason = %skip.reason(), "Skip loading plugin");
                    Err(PluginError::Skipped {
                        uri: uri.to_string(),
                        reason: skip.reason().to_string(),
                    })
                }
                None => {
                    warn!(plugin = %uri, error = %err, "Failed to load plugin");
                    Err(PluginError::InitFailed {
                        uri: uri.to_string(),
                        reason: err.to_string(),
                    })
                }
            },
        };

        LoadedPlugin::new(registration.plugin_type, registration.id, ic.meta(), outcome)
            .with_closer(ic.closer())
    }
}
