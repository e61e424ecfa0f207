//! In-process runtime client.
//!
//! Plugins that drive containers (the CRI plugin in particular) talk to the
//! runtime's core services through a [`Client`].  When they live in the same
//! process as those services, the client wraps the service plugins' exported
//! instances directly instead of dialing the host address.
//!
//! ```rust,ignore
//! let client = Client::builder()
//!     .default_namespace("k8s.io")
//!     .default_platform(Platform::host_default())
//!     .in_memory_services(&ic)
//!     .build()?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use corral_core::{Instance, Platform, PluginError, PluginLookup, PluginType};
use thiserror::Error;
use tracing::debug;

/// Namespace used when the builder is not given one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Service plugins (type `io.corral.service.v1`) an in-process client wraps.
pub const REQUIRED_SERVICES: &[&str] = &[
    "content",
    "images",
    "containers",
    "tasks",
    "snapshots",
    "leases",
    "namespaces",
    "diff",
    "introspection",
];

/// Id of the event exchange plugin (type `io.corral.event.v1`).
pub const EVENT_EXCHANGE: &str = "exchange";

/// Errors from building a [`Client`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// A required in-process service is missing or failed to initialize.
    #[error("service {service} not found: {source}")]
    ServiceNotFound {
        /// `<type>.<id>` of the missing service.
        service: String,
        /// Lookup failure.
        #[source]
        source: PluginError,
    },

    /// `build` was called without a service source.
    #[error("no services configured for the client")]
    NoServices,

    /// The default namespace is empty.
    #[error("namespace must not be empty")]
    EmptyNamespace,
}

/// A runtime client bound to one default namespace and platform.
///
/// Cheap to share behind an `Arc`; it holds only service handles and is never
/// closed by its users.
#[derive(Debug, Clone)]
pub struct Client {
    namespace: String,
    platform: Platform,
    services: BTreeMap<&'static str, Instance>,
    events: Instance,
}

impl Client {
    /// Starts building a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Namespace used for every request that does not set one.
    pub fn default_namespace(&self) -> &str {
        &self.namespace
    }

    /// Platform used for image operations that do not set one.
    pub fn default_platform(&self) -> &Platform {
        &self.platform
    }

    /// Raw handle of a wrapped service.
    pub fn service(&self, name: &str) -> Option<&Instance> {
        self.services.get(name)
    }

    /// Typed handle of a wrapped service.
    pub fn service_as<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.service(name).and_then(Instance::downcast::<T>)
    }

    /// Handle of the event exchange.
    pub fn events(&self) -> &Instance {
        &self.events
    }

    /// Names of the wrapped services.
    pub fn service_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.services.keys().copied()
    }
}

type ServiceLookup = Result<Instance, ClientError>;

/// Builder for [`Client`].
#[derive(Debug, Default)]
pub struct ClientBuilder {
    namespace: Option<String>,
    platform: Option<Platform>,
    services: Option<Vec<(&'static str, ServiceLookup)>>,
    events: Option<ServiceLookup>,
}

impl ClientBuilder {
    /// Sets the default namespace.
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the default platform (the host platform if unset).
    pub fn default_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Wraps the in-process service plugins visible through `lookup`.
    pub fn in_memory_services(mut self, lookup: &dyn PluginLookup) -> Self {
        let fetch = |plugin_type: PluginType, id: &'static str| -> ServiceLookup {
            lookup
                .get_by_id(plugin_type, id)
                .map_err(|source| ClientError::ServiceNotFound {
                    service: format!("{plugin_type}.{id}"),
                    source,
                })
        };

        self.services = Some(
            REQUIRED_SERVICES
                .iter()
                .map(|&id| (id, fetch(PluginType::SERVICE, id)))
                .collect(),
        );
        self.events = Some(fetch(PluginType::EVENT, EVENT_EXCHANGE));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// The first missing service, [`ClientError::NoServices`] without a
    /// service source, or [`ClientError::EmptyNamespace`].
    pub fn build(self) -> Result<Client, ClientError> {
        let namespace = self
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        if namespace.is_empty() {
            return Err(ClientError::EmptyNamespace);
        }

        let (Some(lookups), Some(events)) = (self.services, self.events) else {
            return Err(ClientError::NoServices);
        };

        let mut services = BTreeMap::new();
        for (id, lookup) in lookups {
            services.insert(id, lookup?);
        }
        let events = events?;

        let platform = self.platform.unwrap_or_else(Platform::host_default);
        debug!(
            namespace = %namespace,
            platform = %platform,
            services = services.len(),
            "Runtime client ready"
        );

        Ok(Client {
            namespace,
            platform,
            services,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use corral_core::{LoadedPlugin, PluginSet};

    use super::*;

    fn full_set() -> PluginSet {
        let mut set = PluginSet::new();
        for &id in REQUIRED_SERVICES {
            set.insert(LoadedPlugin::loaded(
                PluginType::SERVICE,
                id,
                Instance::new(Arc::new(id.to_string())),
            ));
        }
        set.with(LoadedPlugin::loaded(
            PluginType::EVENT,
            EVENT_EXCHANGE,
            Instance::new(Arc::new(())),
        ))
    }

    #[test]
    fn test_build_binds_namespace_and_platform() {
        let client = Client::builder()
            .default_namespace("k8s.io")
            .default_platform(Platform::new("linux", "arm64"))
            .in_memory_services(&full_set())
            .build()
            .unwrap();

        assert_eq!(client.default_namespace(), "k8s.io");
        assert_eq!(client.default_platform().architecture, "arm64");
        assert_eq!(client.service_names().count(), REQUIRED_SERVICES.len());
        assert_eq!(client.service_as::<String>("tasks").as_deref().map(String::as_str), Some("tasks"));
    }

    #[test]
    fn test_missing_service_is_reported() {
        let mut set = PluginSet::new();
        for &id in REQUIRED_SERVICES.iter().filter(|&&id| id != "leases") {
            set.insert(LoadedPlugin::loaded(PluginType::SERVICE, id, Instance::new(Arc::new(()))));
        }
        set.insert(LoadedPlugin::loaded(PluginType::EVENT, EVENT_EXCHANGE, Instance::new(Arc::new(()))));

        let err = Client::builder()
            .default_namespace("k8s.io")
            .in_memory_services(&set)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::ServiceNotFound { ref service, .. } if service == "io.corral.service.v1.leases"));
    }

    #[test]
    fn test_build_without_services() {
        let err = Client::builder().build().unwrap_err();
        assert!(matches!(err, ClientError::NoServices));
    }
}
