//! Capability resolution for optional sibling plugins.
//!
//! A plugin that integrates with another one looks it up by `(type, id)` and
//! then checks that the exported value really implements the trait it needs.
//! The two checks fail differently:
//!
//! - the sibling does not exist or did not initialize → [`Resolution::Absent`];
//! - the sibling exists but exports something else → [`Resolution::Mismatch`].
//!
//! Callers decide what each case means for them.  The distinction is kept all
//! the way through [`Resolution::into_result`], where only a mismatch becomes
//! an error.

use std::any::type_name;
use std::sync::Arc;

use thiserror::Error;

use crate::error::PluginError;
use crate::plugin::PluginType;
use crate::set::PluginLookup;

/// Outcome of resolving a capability of type `T`.
#[derive(Debug)]
pub enum Resolution<T: ?Sized> {
    /// The sibling exists and exports `Arc<T>`.
    Present(Arc<T>),
    /// The sibling is missing, disabled, skipped or failed to initialize.
    Absent(PluginError),
    /// The sibling exists but exports an incompatible type.
    Mismatch(ResolveError),
}

impl<T: ?Sized> Resolution<T> {
    /// Returns the handle when present.
    pub fn present(self) -> Option<Arc<T>> {
        match self {
            Self::Present(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returns `true` for [`Resolution::Present`].
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Treats absence as `Ok(None)` and a type mismatch as an error.
    pub fn into_result(self) -> Result<Option<Arc<T>>, ResolveError> {
        match self {
            Self::Present(handle) => Ok(Some(handle)),
            Self::Absent(_) => Ok(None),
            Self::Mismatch(err) => Err(err),
        }
    }
}

/// A sibling plugin exported a value of the wrong type.
#[derive(Debug, Clone, Error)]
#[error("plugin ({plugin_type}, {id:?}) has incompatible type {found}, expected {expected}")]
pub struct ResolveError {
    /// Type of the looked-up plugin.
    pub plugin_type: PluginType,
    /// Id of the looked-up plugin.
    pub id: String,
    /// Trait or type the caller required.
    pub expected: &'static str,
    /// Type the plugin actually exported.
    pub found: &'static str,
}

/// Looks up `(plugin_type, id)` and checks it exports `Arc<T>`.
///
/// ```rust,ignore
/// match resolve::<dyn NriApi>(&ic, PluginType::NRI_API, "nri") {
///     Resolution::Present(api) => api.start().await?,
///     Resolution::Absent(err) => info!(error = %err, "NRI not available"),
///     Resolution::Mismatch(err) => warn!(error = %err, "NRI plugin is incompatible"),
/// }
/// ```
pub fn resolve<T>(lookup: &dyn PluginLookup, plugin_type: PluginType, id: &str) -> Resolution<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    let instance = match lookup.get_by_id(plugin_type, id) {
        Ok(instance) => instance,
        Err(err) => return Resolution::Absent(err),
    };

    match instance.downcast::<T>() {
        Some(handle) => Resolution::Present(handle),
        None => Resolution::Mismatch(ResolveError {
            plugin_type,
            id: id.to_string(),
            expected: type_name::<T>(),
            found: instance.type_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Instance;
    use crate::set::{LoadedPlugin, PluginSet};

    trait Starter: Send + Sync {
        fn start(&self) -> bool;
    }

    struct Ok_;

    impl Starter for Ok_ {
        fn start(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_present() {
        let api: Arc<dyn Starter> = Arc::new(Ok_);
        let set = PluginSet::new().with(LoadedPlugin::loaded(
            PluginType::NRI_API,
            "nri",
            Instance::new(api),
        ));

        let resolved = resolve::<dyn Starter>(&set, PluginType::NRI_API, "nri");
        assert!(resolved.present().unwrap().start());
    }

    #[test]
    fn test_absent_is_not_an_error() {
        let set = PluginSet::new();
        let resolved = resolve::<dyn Starter>(&set, PluginType::NRI_API, "nri");
        assert!(matches!(resolved, Resolution::Absent(ref e) if e.is_not_found()));
        assert!(resolved.into_result().unwrap().is_none());
    }

    #[test]
    fn test_mismatch_is_distinct_from_absent() {
        let set = PluginSet::new().with(LoadedPlugin::loaded(
            PluginType::NRI_API,
            "nri",
            Instance::new(Arc::new(String::from("not an api"))),
        ));

        let resolved = resolve::<dyn Starter>(&set, PluginType::NRI_API, "nri");
        let Resolution::Mismatch(err) = resolved else {
            panic!("expected a mismatch");
        };
        assert!(err.found.contains("String"));
        assert!(err.to_string().contains("incompatible type"));
    }
}
