//! Sandbox-mode CRI service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use corral_runtime::Client;

use super::blockio::{BlockIo, BlockIoError, LinuxBlockIo};
use super::{CriService, ServeLoop, ServiceError, ServiceResult};
use crate::config::Config;
use crate::mode::ServiceMode;

/// Sandbox modes a runtime handler may ask for.
const SANDBOX_MODES: &[&str] = &["podsandbox", "shim"];

/// The experimental CRI service, where pod sandboxes are managed by sandbox
/// controllers selected per runtime handler.
pub struct SandboxService {
    config: Config,
    client: Arc<Client>,
    blockio: BlockIo,
    serve: ServeLoop,
}

impl SandboxService {
    /// Creates the service.
    ///
    /// Fails if a runtime names a sandbox mode other than `podsandbox` or
    /// `shim`.
    pub fn new(config: &Config, client: Arc<Client>) -> ServiceResult<Self> {
        if let Some((name, runtime)) = config
            .plugin
            .containerd
            .runtimes
            .iter()
            .find(|(_, r)| !SANDBOX_MODES.contains(&r.sandbox_mode.as_str()))
        {
            return Err(ServiceError::InvalidConfig(format!(
                "runtime {name:?} has unsupported sandbox mode {:?}",
                runtime.sandbox_mode
            )));
        }

        Ok(Self {
            serve: ServeLoop::new(ServiceMode::Sandbox, config)?,
            blockio: BlockIo::from_config(&config.plugin),
            config: config.clone(),
            client,
        })
    }

    /// The configuration the service was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The runtime client, bound to the CRI namespace.
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Resolves a container's block-I/O class from its annotations.
    pub fn blockio_class_from_annotations(
        &self,
        container_name: &str,
        container_annotations: &HashMap<String, String>,
        pod_annotations: &HashMap<String, String>,
    ) -> Result<Option<String>, BlockIoError> {
        self.blockio
            .class_from_annotations(container_name, container_annotations, pod_annotations)
    }

    /// The OCI block-I/O settings of `class`.
    pub fn blockio_to_linux_oci(&self, class: &str) -> Result<LinuxBlockIo, BlockIoError> {
        self.blockio.to_linux_oci(class)
    }
}

#[async_trait]
impl CriService for SandboxService {
    fn mode(&self) -> ServiceMode {
        self.serve.mode()
    }

    async fn run(&self) -> ServiceResult<()> {
        self.serve.serve().await
    }

    async fn close(&self) -> ServiceResult<()> {
        self.serve.close();
        Ok(())
    }
}
