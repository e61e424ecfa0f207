//! Legacy-mode CRI service.

use std::sync::Arc;

use async_trait::async_trait;
use corral_runtime::Client;
use tracing::debug;

use super::blockio::BlockIo;
use super::{CriService, ServeLoop, ServiceResult};
use crate::config::Config;
use crate::mode::ServiceMode;
use crate::nri::NriApi;

/// The established CRI service.
///
/// It is the only service that integrates with NRI; without an NRI handle it
/// serves containers unmodified.
pub struct LegacyService {
    config: Config,
    client: Arc<Client>,
    nri: Option<Arc<dyn NriApi>>,
    blockio: BlockIo,
    serve: ServeLoop,
}

impl LegacyService {
    /// Creates the service.
    pub fn new(
        config: &Config,
        client: Arc<Client>,
        nri: Option<Arc<dyn NriApi>>,
    ) -> ServiceResult<Self> {
        Ok(Self {
            serve: ServeLoop::new(ServiceMode::Legacy, config)?,
            blockio: BlockIo::from_config(&config.plugin),
            config: config.clone(),
            client,
            nri,
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

    /// The NRI handle, when NRI integration is active.
    pub fn nri(&self) -> Option<&Arc<dyn NriApi>> {
        self.nri.as_ref()
    }

    /// Block-I/O class handling.
    pub fn blockio(&self) -> &BlockIo {
        &self.blockio
    }
}

#[async_trait]
impl CriService for LegacyService {
    fn mode(&self) -> ServiceMode {
        self.serve.mode()
    }

    async fn run(&self) -> ServiceResult<()> {
        debug!(nri = self.nri.is_some(), "Starting legacy CRI service");
        self.serve.serve().await
    }

    async fn close(&self) -> ServiceResult<()> {
        self.serve.close();
        Ok(())
    }
}
