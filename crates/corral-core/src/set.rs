//! The set of plugins the host has processed.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{PluginError, PluginResult};
use crate::plugin::{CloserSlot, Instance, Meta, PluginType};

/// Read access to initialized sibling plugins.
///
/// Implemented by [`PluginSet`] and by [`InitContext`](crate::context::InitContext),
/// so components that only need lookups can be exercised against either.
pub trait PluginLookup: Send + Sync {
    /// Returns the instance exported by `(plugin_type, id)`.
    ///
    /// Fails with [`PluginError::NotFound`] when no such plugin was processed,
    /// and with the recorded error when it was disabled, skipped or failed.
    fn get_by_id(&self, plugin_type: PluginType, id: &str) -> PluginResult<Instance>;

    /// Returns every successfully initialized plugin of `plugin_type`, keyed
    /// by id.
    fn get_by_type(&self, plugin_type: PluginType) -> HashMap<&'static str, Instance>;
}

/// Load state of a processed plugin.
///
/// ```text
/// init ok             ──► Loaded
/// init → SkipPlugin   ──► Skipped
/// init → other error  ──► Failed
/// in disabled_plugins ──► Disabled (init never called)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    /// Initialized and exporting an instance.
    Loaded,
    /// Declined to initialize.
    Skipped,
    /// Init returned an error.
    Failed,
    /// Never initialized because the host disabled it.
    Disabled,
}

/// One processed plugin: its identity, published metadata and outcome.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    plugin_type: PluginType,
    id: &'static str,
    meta: Meta,
    outcome: Result<Instance, PluginError>,
    closer: CloserSlot,
}

impl LoadedPlugin {
    /// Records a plugin outcome.
    pub fn new(
        plugin_type: PluginType,
        id: &'static str,
        meta: Meta,
        outcome: Result<Instance, PluginError>,
    ) -> Self {
        Self {
            plugin_type,
            id,
            meta,
            outcome,
            closer: CloserSlot::default(),
        }
    }

    /// Attaches the plugin's shutdown hook.
    pub fn with_closer(mut self, closer: CloserSlot) -> Self {
        self.closer = closer;
        self
    }

    /// Shorthand for a successfully loaded plugin with empty metadata.
    pub fn loaded(plugin_type: PluginType, id: &'static str, instance: Instance) -> Self {
        Self::new(plugin_type, id, Meta::default(), Ok(instance))
    }

    /// Plugin type.
    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    /// Plugin id.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// `<type>.<id>`.
    pub fn uri(&self) -> String {
        format!("{}.{}", self.plugin_type, self.id)
    }

    /// Metadata the plugin published during init.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The exported instance or the error that prevented it.
    pub fn outcome(&self) -> &Result<Instance, PluginError> {
        &self.outcome
    }

    /// Derived load state.
    pub fn status(&self) -> PluginStatus {
        match &self.outcome {
            Ok(_) => PluginStatus::Loaded,
            Err(PluginError::Skipped { .. }) => PluginStatus::Skipped,
            Err(PluginError::Disabled { .. }) => PluginStatus::Disabled,
            Err(_) => PluginStatus::Failed,
        }
    }
}

/// Ordered record of processed plugins, in initialization order.
///
/// Cheap to clone: entries are reference counted.  The manager hands each
/// init call a snapshot containing every plugin processed before it.
#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    ordered: Vec<Arc<LoadedPlugin>>,
    by_uri: HashMap<String, usize>,
}

impl PluginSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin.  A second entry with the same `(type, id)` replaces
    /// the lookup target but keeps both in [`iter`](Self::iter) order.
    pub fn insert(&mut self, plugin: LoadedPlugin) {
        let uri = plugin.uri();
        self.ordered.push(Arc::new(plugin));
        self.by_uri.insert(uri, self.ordered.len() - 1);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, plugin: LoadedPlugin) -> Self {
        self.insert(plugin);
        self
    }

    /// Looks up a processed plugin.
    pub fn get(&self, plugin_type: PluginType, id: &str) -> Option<&LoadedPlugin> {
        self.by_uri
            .get(&format!("{plugin_type}.{id}"))
            .map(|&idx| self.ordered[idx].as_ref())
    }

    /// Load state of a processed plugin.
    pub fn status(&self, plugin_type: PluginType, id: &str) -> Option<PluginStatus> {
        self.get(plugin_type, id).map(LoadedPlugin::status)
    }

    /// Iterates plugins in initialization order.
    pub fn iter(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.ordered.iter().map(Arc::as_ref)
    }

    /// Number of processed plugins.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns `true` when nothing was processed.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Runs every registered shutdown hook in reverse initialization order.
    ///
    /// Errors are logged and do not stop the remaining hooks.
    pub async fn close_all(&self) {
        for plugin in self.ordered.iter().rev() {
            let Some(closer) = plugin.closer.get() else {
                continue;
            };
            match closer.close().await {
                Ok(()) => info!(plugin = %plugin.uri(), "Plugin closed"),
                Err(e) => warn!(plugin = %plugin.uri(), error = %e, "Failed to close plugin"),
            }
        }
    }
}

impl PluginLookup for PluginSet {
    fn get_by_id(&self, plugin_type: PluginType, id: &str) -> PluginResult<Instance> {
        match self.get(plugin_type, id) {
            Some(plugin) => plugin.outcome.clone(),
            None => Err(PluginError::not_found(plugin_type, id)),
        }
    }

    fn get_by_type(&self, plugin_type: PluginType) -> HashMap<&'static str, Instance> {
        self.ordered
            .iter()
            .filter(|p| p.plugin_type == plugin_type)
            .filter_map(|p| p.outcome.as_ref().ok().map(|i| (p.id, i.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::BoxError;
    use crate::plugin::Closer;

    fn instance() -> Instance {
        Instance::new(Arc::new(1_u32))
    }

    #[test]
    fn test_lookup_reports_recorded_error() {
        let set = PluginSet::new()
            .with(LoadedPlugin::loaded(PluginType::SERVICE, "content", instance()))
            .with(LoadedPlugin::new(
                PluginType::NRI_API,
                "nri",
                Meta::default(),
                Err(PluginError::Skipped {
                    uri: "io.corral.nri.v1.nri".into(),
                    reason: "disabled".into(),
                }),
            ));

        assert!(set.get_by_id(PluginType::SERVICE, "content").is_ok());
        assert!(matches!(
            set.get_by_id(PluginType::NRI_API, "nri"),
            Err(PluginError::Skipped { .. })
        ));
        assert!(
            set.get_by_id(PluginType::SERVICE, "images")
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(set.status(PluginType::NRI_API, "nri"), Some(PluginStatus::Skipped));
    }

    #[test]
    fn test_get_by_type_only_returns_loaded() {
        let set = PluginSet::new()
            .with(LoadedPlugin::loaded(PluginType::SERVICE, "content", instance()))
            .with(LoadedPlugin::loaded(PluginType::SERVICE, "images", instance()))
            .with(LoadedPlugin::new(
                PluginType::SERVICE,
                "tasks",
                Meta::default(),
                Err(PluginError::Disabled {
                    uri: "io.corral.service.v1.tasks".into(),
                }),
            ))
            .with(LoadedPlugin::loaded(PluginType::EVENT, "exchange", instance()));

        let services = set.get_by_type(PluginType::SERVICE);
        assert_eq!(services.len(), 2);
        assert!(services.contains_key("content"));
        assert!(!services.contains_key("tasks"));
    }

    struct Recorder {
        order: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    #[async_trait]
    impl Closer for Recorder {
        async fn close(&self) -> Result<(), BoxError> {
            self.order.lock().push(self.name);
            if self.name == "first" {
                return Err("already closed".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_all_runs_in_reverse_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let closer = |name| {
            CloserSlot::new(Arc::new(Recorder {
                order: Arc::clone(&order),
                name,
            }))
        };

        let set = PluginSet::new()
            .with(LoadedPlugin::loaded(PluginType::EVENT, "exchange", instance()).with_closer(closer("first")))
            .with(LoadedPlugin::loaded(PluginType::SERVICE, "content", instance()))
            .with(LoadedPlugin::loaded(PluginType::GRPC, "cri", instance()).with_closer(closer("second")));

        set.close_all().await;
        assert_eq!(*order.lock(), ["second", "first"]);
    }
}
