//! Error types for the plugin host.
//!
//! Every plugin-level failure surfaces as a [`PluginError`].  Lookups return
//! it so callers can tell a plugin that was never registered apart from one
//! that was disabled, skipped itself, or failed during initialization.

use thiserror::Error;

use crate::plugin::PluginType;

/// Boxed error returned by plugin init functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the registry, the plugin manager and plugin lookups.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// No plugin with this type and id was registered.
    #[error("plugin {plugin_type}.{id} not found")]
    NotFound {
        /// Requested plugin type.
        plugin_type: PluginType,
        /// Requested plugin id.
        id: String,
    },

    /// The plugin is listed in `disabled_plugins` and was never initialized.
    #[error("plugin {uri} is disabled")]
    Disabled {
        /// `<type>.<id>` of the plugin.
        uri: String,
    },

    /// The plugin declined to initialize by returning [`SkipPlugin`].
    #[error("plugin {uri} skipped: {reason}")]
    Skipped {
        /// `<type>.<id>` of the plugin.
        uri: String,
        /// Reason given by the plugin.
        reason: String,
    },

    /// The plugin's init function returned an error.
    #[error("plugin {uri} failed to initialize: {reason}")]
    InitFailed {
        /// `<type>.<id>` of the plugin.
        uri: String,
        /// Rendered init error.
        reason: String,
    },

    /// The plugin's configuration section could not be decoded.
    #[error("invalid configuration for plugin {uri}: {reason}")]
    InvalidConfig {
        /// `<type>.<id>` of the plugin.
        uri: String,
        /// Decoder message.
        reason: String,
    },

    /// The `requires` edges between registrations form a cycle.
    #[error("plugin dependency cycle detected among: {0}")]
    DependencyCycle(String),

    /// A plugin listed in `required_plugins` did not come up.
    #[error("required plugin {uri} did not initialize: {reason}")]
    RequiredFailed {
        /// `<type>.<id>` of the plugin.
        uri: String,
        /// Why it is unavailable.
        reason: String,
    },
}

impl PluginError {
    /// Creates a not-found error.
    pub fn not_found(plugin_type: PluginType, id: impl Into<String>) -> Self {
        Self::NotFound {
            plugin_type,
            id: id.into(),
        }
    }

    /// Returns `true` when the plugin simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Returned by an init function to signal that the plugin opted out.
///
/// The manager records the plugin as skipped instead of failed and logs the
/// reason at info level.
///
/// ```rust,ignore
/// fn init(ic: InitContext) -> BoxFuture<'static, Result<Instance, BoxError>> {
///     Box::pin(async move {
///         if !enabled {
///             return Err(SkipPlugin::new("nri is disabled").into());
///         }
///         // ...
///     })
/// }
/// ```
#[derive(Debug, Clone, Error)]
#[error("skip plugin: {reason}")]
pub struct SkipPlugin {
    reason: String,
}

impl SkipPlugin {
    /// Creates a skip marker with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason the plugin gave.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Result alias for host operations.
pub type PluginResult<T> = Result<T, PluginError>;
