//! Node Resource Interface (NRI) capability.
//!
//! NRI lets external plugins adjust containers as they are created.  It is
//! provided by an optional sibling plugin, `io.corral.nri.v1.nri`; the CRI
//! plugin only needs to know whether that sibling exists and how to start it.

use std::sync::Arc;

use async_trait::async_trait;
use corral_core::{BoxError, PluginLookup, PluginType, Resolution, resolve};
use tracing::{info, warn};

use crate::constants::NRI_PLUGIN_ID;

/// What the CRI plugin requires of an NRI plugin.
///
/// The NRI plugin exports an `Arc<dyn NriApi>` as its instance.
#[async_trait]
pub trait NriApi: Send + Sync {
    /// Starts accepting NRI plugin connections.
    ///
    /// A sibling whose own configuration disables NRI returns `Ok(())`
    /// without doing anything.
    async fn start(&self) -> Result<(), BoxError>;
}

/// Looks up the NRI sibling.
pub fn resolve_nri(lookup: &dyn PluginLookup) -> Resolution<dyn NriApi> {
    resolve::<dyn NriApi>(lookup, PluginType::NRI_API, NRI_PLUGIN_ID)
}

/// Resolves NRI for the legacy service, logging why it is unavailable.
///
/// Absence and incompatibility both disable NRI integration; neither fails
/// the CRI plugin.
pub(crate) fn nri_for_legacy(lookup: &dyn PluginLookup) -> Option<Arc<dyn NriApi>> {
    match resolve_nri(lookup) {
        Resolution::Present(api) => Some(api),
        Resolution::Absent(err) => {
            info!(error = %err, "NRI service not found, disabling NRI support");
            None
        }
        Resolution::Mismatch(err) => {
            warn!(error = %err, "NRI plugin is incompatible, disabling NRI support");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use corral_core::{Instance, LoadedPlugin, PluginSet};

    use super::*;

    /// An NRI sibling whose own configuration turned NRI off.
    struct Idle;

    #[async_trait]
    impl NriApi for Idle {
        async fn start(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_present_nri_is_always_used() {
        let api: Arc<dyn NriApi> = Arc::new(Idle);
        let set = PluginSet::new().with(LoadedPlugin::loaded(
            PluginType::NRI_API,
            NRI_PLUGIN_ID,
            Instance::new(Arc::clone(&api)),
        ));

        assert!(resolve_nri(&set).is_present());
        let used = nri_for_legacy(&set).expect("present NRI is handed to the legacy service");
        assert!(Arc::ptr_eq(&used, &api));
    }

    #[test]
    fn test_incompatible_nri_is_not_used() {
        let set = PluginSet::new().with(LoadedPlugin::loaded(
            PluginType::NRI_API,
            NRI_PLUGIN_ID,
            Instance::new(Arc::new("not an api".to_string())),
        ));

        let resolution = resolve_nri(&set);
        assert!(matches!(resolution, Resolution::Mismatch(ref e) if e.found.contains("String")));
        assert!(nri_for_legacy(&set).is_none());
    }
}
