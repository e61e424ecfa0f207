//! # Corral CRI
//!
//! The Kubernetes Container Runtime Interface plugin, registered as
//! `io.corral.grpc.v1.cri`.
//!
//! When the host initializes it, the plugin:
//!
//! 1. validates its configuration section ([`config`]);
//! 2. builds a runtime client bound to the `k8s.io` namespace;
//! 3. in legacy mode, looks up the optional NRI plugin ([`nri`]);
//! 4. builds the service selected by `ENABLE_CRI_SANDBOXES` ([`mode`],
//!    [`service`]);
//! 5. spawns the service and starts NRI ([`startup`]).
//!
//! Linking this crate is enough to register the plugin with
//! [`Registry::from_static`](corral_core::Registry::from_static); explicit
//! registries use [`register`].

pub mod config;
pub mod constants;
pub mod mode;
pub mod nri;
pub mod service;
pub mod startup;

use corral_core::linkme::distributed_slice;
use corral_core::{
    BoxError, BoxFuture, InitContext, Instance, PLUGINS, PluginType, Registration, Registry,
};

pub use config::{Config, ConfigError, PluginConfig, validate_plugin_config};
pub use constants::{CRI_VERSION, CRI_VERSION_ALPHA, K8S_NAMESPACE, PLUGIN_ID};
pub use mode::{ENABLE_CRI_SANDBOXES, ServiceMode};
pub use nri::{NriApi, resolve_nri};
pub use service::{
    CriService, DefaultFactory, LegacyService, SandboxService, ServiceError, ServiceFactory,
};
pub use startup::{ExitProcess, FatalPolicy, InitError, Started, Startup, StartupState};

/// Registration of the CRI plugin.
pub const REGISTRATION: Registration = Registration::new(PluginType::GRPC, PLUGIN_ID, init)
    .requires(&[PluginType::EVENT, PluginType::SERVICE, PluginType::NRI_API])
    .config(PluginConfig::default_value);

#[distributed_slice(PLUGINS)]
#[linkme(crate = corral_core::linkme)]
static CRI_PLUGIN: Registration = REGISTRATION;

/// Adds the CRI plugin to an explicit registry.
pub fn register(registry: &mut Registry) {
    registry.register(REGISTRATION);
}

fn init(ic: InitContext) -> BoxFuture<'static, Result<Instance, BoxError>> {
    Box::pin(async move {
        let started = Startup::from_env().init(&ic).await?;
        Ok::<_, BoxError>(Instance::new(started.service()))
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use corral_core::{LoadedPlugin, PluginSet};
    use corral_runtime::client::EVENT_EXCHANGE;
    use corral_runtime::{Client, REQUIRED_SERVICES};

    use super::*;

    /// A plugin set holding every service a runtime client needs.
    pub(crate) fn services() -> PluginSet {
        let mut set = PluginSet::new();
        for &id in REQUIRED_SERVICES {
            set.insert(LoadedPlugin::loaded(PluginType::SERVICE, id, Instance::new(Arc::new(()))));
        }
        set.with(LoadedPlugin::loaded(
            PluginType::EVENT,
            EVENT_EXCHANGE,
            Instance::new(Arc::new(())),
        ))
    }

    pub(crate) fn client() -> Arc<Client> {
        let client = Client::builder()
            .default_namespace(K8S_NAMESPACE)
            .in_memory_services(&services())
            .build()
            .unwrap();
        Arc::new(client)
    }
}
