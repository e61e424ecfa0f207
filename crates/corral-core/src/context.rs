//! Per-plugin initialization context.
//!
//! An [`InitContext`] is what a plugin's init function receives.  It carries:
//!
//! - the plugin's own directories (`root`, `state`) and the host's endpoint,
//! - the plugin's configuration section, already merged with its defaults,
//! - a snapshot of every plugin processed before it, for sibling lookups,
//! - a handle to the plugin's [`Meta`], which stays with the host after init.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{PluginError, PluginResult};
use crate::platform::Platform;
use crate::plugin::{Closer, CloserSlot, Instance, Meta, PluginType};
use crate::set::{PluginLookup, PluginSet};

/// Context handed to a plugin's init function.
#[derive(Debug, Clone)]
pub struct InitContext {
    plugin_type: PluginType,
    id: &'static str,
    root: PathBuf,
    state: PathBuf,
    address: String,
    config: Arc<Value>,
    plugins: Arc<PluginSet>,
    meta: Arc<Mutex<Meta>>,
    closer: Arc<Mutex<CloserSlot>>,
}

impl InitContext {
    /// Starts building a context for `(plugin_type, id)`.
    pub fn builder(plugin_type: PluginType, id: &'static str) -> InitContextBuilder {
        InitContextBuilder {
            plugin_type,
            id,
            root: PathBuf::new(),
            state: PathBuf::new(),
            address: String::new(),
            config: Value::Object(Map::new()),
            plugins: Arc::new(PluginSet::new()),
        }
    }

    /// Type of the plugin being initialized.
    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    /// Id of the plugin being initialized.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// `<type>.<id>`.
    pub fn uri(&self) -> String {
        format!("{}.{}", self.plugin_type, self.id)
    }

    /// The plugin's persistent root directory (`<host root>/<uri>`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The plugin's runtime state directory (`<host state>/<uri>`).
    pub fn state(&self) -> &Path {
        &self.state
    }

    /// The host's communication endpoint.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The raw configuration section.
    pub fn raw_config(&self) -> &Value {
        &self.config
    }

    /// Decodes the configuration section into `T`.
    pub fn config<T: DeserializeOwned>(&self) -> PluginResult<T> {
        T::deserialize(self.config.as_ref()).map_err(|e| PluginError::InvalidConfig {
            uri: self.uri(),
            reason: e.to_string(),
        })
    }

    /// Snapshot of the plugins initialized before this one.
    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Replaces the platforms this plugin announces.
    pub fn set_platforms(&self, platforms: Vec<Platform>) {
        self.meta.lock().platforms = platforms;
    }

    /// Adds a key/value export.
    pub fn export(&self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.lock().exports.insert(key.into(), value.into());
    }

    /// Adds a capability flag.
    pub fn add_capability(&self, capability: impl Into<String>) {
        self.meta.lock().capabilities.push(capability.into());
    }

    /// Current metadata.
    pub fn meta(&self) -> Meta {
        self.meta.lock().clone()
    }

    /// Registers the hook the host runs when it shuts down.
    pub fn set_closer(&self, closer: Arc<dyn Closer>) {
        *self.closer.lock() = CloserSlot::new(closer);
    }

    /// The registered shutdown hook.
    pub fn closer(&self) -> CloserSlot {
        self.closer.lock().clone()
    }
}

impl PluginLookup for InitContext {
    fn get_by_id(&self, plugin_type: PluginType, id: &str) -> PluginResult<Instance> {
        self.plugins.get_by_id(plugin_type, id)
    }

    fn get_by_type(&self, plugin_type: PluginType) -> HashMap<&'static str, Instance> {
        self.plugins.get_by_type(plugin_type)
    }
}

/// Builder for [`InitContext`].
///
/// The plugin manager uses it for every plugin; tests use it to drive an init
/// function against a hand-made plugin set.
#[derive(Debug)]
pub struct InitContextBuilder {
    plugin_type: PluginType,
    id: &'static str,
    root: PathBuf,
    state: PathBuf,
    address: String,
    config: Value,
    plugins: Arc<PluginSet>,
}

impl InitContextBuilder {
    /// Sets the root directory.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the state directory.
    pub fn state(mut self, state: impl Into<PathBuf>) -> Self {
        self.state = state.into();
        self
    }

    /// Sets the host endpoint.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the configuration section.
    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Sets the sibling plugin snapshot.
    pub fn plugins(mut self, plugins: impl Into<Arc<PluginSet>>) -> Self {
        self.plugins = plugins.into();
        self
    }

    /// Builds the context with empty metadata.
    pub fn build(self) -> InitContext {
        InitContext {
            plugin_type: self.plugin_type,
            id: self.id,
            root: self.root,
            state: self.state,
            address: self.address,
            config: Arc::new(self.config),
            plugins: self.plugins,
            meta: Arc::new(Mutex::new(Meta::default())),
            closer: Arc::new(Mutex::new(CloserSlot::default())),
        }
    }
}
