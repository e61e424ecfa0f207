//! Static plugin registrations.

use futures::future::BoxFuture;
use linkme::distributed_slice;
use serde_json::{Map, Value};

use super::{Instance, PluginType};
use crate::context::InitContext;
use crate::error::BoxError;

/// Init entry point stored in a [`Registration`].
///
/// Receives the plugin's [`InitContext`] and resolves to the value the
/// plugin exports, or an error.  Returning [`SkipPlugin`](crate::SkipPlugin)
/// marks the plugin as skipped rather than failed.
pub type InitFn = fn(InitContext) -> BoxFuture<'static, Result<Instance, BoxError>>;

/// Every registration linked into the binary.
///
/// Entries are collected at link time; use
/// [`Registry::from_static`](crate::registry::Registry::from_static) to copy
/// them into a registry.
#[distributed_slice]
pub static PLUGINS: [Registration];

/// A static, `Copy` descriptor that identifies and initializes a plugin.
///
/// Built once as a `static` item and never mutated.  The host consults it
/// exactly once per process: the init function is not invoked until every
/// plugin of every type listed in [`requires`](Self::requires) has finished
/// its own initialization.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// Capability type this plugin provides.
    pub plugin_type: PluginType,
    /// Id, unique within `plugin_type`.
    pub id: &'static str,
    /// Plugin types that must be initialized first.
    pub requires: &'static [PluginType],
    /// Produces the default configuration; the host overlays the user's
    /// section on top of it.
    pub config: Option<fn() -> Value>,
    /// Init entry point.
    pub init: InitFn,
}

impl Registration {
    /// Creates a registration with no requirements and no configuration.
    pub const fn new(plugin_type: PluginType, id: &'static str, init: InitFn) -> Self {
        Self {
            plugin_type,
            id,
            requires: &[],
            config: None,
            init,
        }
    }

    /// Sets the required plugin types.
    pub const fn requires(mut self, requires: &'static [PluginType]) -> Self {
        self.requires = requires;
        self
    }

    /// Sets the default configuration factory.
    pub const fn config(mut self, config: fn() -> Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Returns `<type>.<id>`, the key used in logs and on disk.
    pub fn uri(&self) -> String {
        format!("{}.{}", self.plugin_type, self.id)
    }

    /// Returns `true` if this plugin must initialize after `other`.
    pub fn depends_on(&self, other: &Registration) -> bool {
        if self.plugin_type == other.plugin_type && self.id == other.id {
            return false;
        }
        self.requires
            .iter()
            .any(|t| *t == other.plugin_type || (t.is_wildcard() && !other.requires_all()))
    }

    /// Returns `true` if this plugin requires the `*` wildcard.
    pub fn requires_all(&self) -> bool {
        self.requires.iter().any(PluginType::is_wildcard)
    }

    /// Builds the effective configuration: the default overlaid with `user`.
    ///
    /// Objects are merged key by key, recursively; any other value in `user`
    /// replaces the default outright.
    pub fn effective_config(&self, user: Option<&Value>) -> Value {
        let mut base = self
            .config
            .map(|f| f())
            .unwrap_or_else(|| Value::Object(Map::new()));
        if let Some(user) = user {
            merge_value(&mut base, user);
        }
        base
    }
}

fn merge_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(_: InitContext) -> BoxFuture<'static, Result<Instance, BoxError>> {
        Box::pin(async { Ok(Instance::new(std::sync::Arc::new(()))) })
    }

    fn defaults() -> Value {
        json!({ "enabled": true, "limits": { "max": 3, "min": 1 } })
    }

    #[test]
    fn test_effective_config_overlays_nested_keys() {
        let reg = Registration::new(PluginType::INTERNAL, "a", noop).config(defaults);
        let user = json!({ "limits": { "max": 10 } });
        let cfg = reg.effective_config(Some(&user));
        assert_eq!(cfg, json!({ "enabled": true, "limits": { "max": 10, "min": 1 } }));
    }

    #[test]
    fn test_effective_config_without_defaults() {
        let reg = Registration::new(PluginType::INTERNAL, "a", noop);
        assert_eq!(reg.effective_config(None), json!({}));
    }

    #[test]
    fn test_wildcard_does_not_depend_on_other_wildcards() {
        let all_a = Registration::new(PluginType::GRPC, "a", noop).requires(&[PluginType::ALL]);
        let all_b = Registration::new(PluginType::GRPC, "b", noop).requires(&[PluginType::ALL]);
        let event = Registration::new(PluginType::EVENT, "exchange", noop);
        assert!(all_a.depends_on(&event));
        assert!(!all_a.depends_on(&all_b));
        assert!(!all_a.depends_on(&all_a));
    }
}
