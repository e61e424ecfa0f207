//! The CRI services.
//!
//! Two implementations of [`CriService`] exist and exactly one runs per
//! process, picked by [`ServiceMode`]:
//!
//! - [`SandboxService`]: the experimental sandbox-controller based service;
//! - [`LegacyService`]: the established service, the only one that
//!   integrates with NRI.
//!
//! Construction goes through a [`ServiceFactory`] so the startup path can be
//! exercised with substitute services.

pub mod blockio;
pub mod legacy;
pub mod sandbox;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use corral_core::{BoxError, Closer};
use corral_runtime::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use blockio::{BlockIo, BlockIoError, LinuxBlockIo, LinuxThrottleDevice, LinuxWeightDevice};
pub use legacy::LegacyService;
pub use sandbox::SandboxService;

use crate::config::Config;
use crate::mode::ServiceMode;
use crate::nri::NriApi;

/// Errors from constructing or running a CRI service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configuration cannot back this service.
    #[error("invalid service configuration: {0}")]
    InvalidConfig(String),

    /// A service directory could not be created.
    #[error("failed to create {path}: {source}")]
    CreateDir {
        /// Directory being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `run` was called twice.
    #[error("service is already running")]
    AlreadyRunning,

    /// Any other service failure.
    #[error(transparent)]
    Other(BoxError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A CRI service.
#[async_trait]
pub trait CriService: Send + Sync {
    /// Which implementation this is.
    fn mode(&self) -> ServiceMode;

    /// Serves until [`close`](Self::close) is called or an unrecoverable
    /// error occurs.
    async fn run(&self) -> ServiceResult<()>;

    /// Makes a pending or future [`run`](Self::run) return.
    async fn close(&self) -> ServiceResult<()>;
}

/// Constructs the CRI services.
///
/// Only the legacy constructor takes an NRI handle.
pub trait ServiceFactory: Send + Sync {
    /// Builds the sandbox-mode service.
    fn new_sandbox(&self, config: &Config, client: Arc<Client>) -> ServiceResult<Arc<dyn CriService>>;

    /// Builds the legacy-mode service.
    fn new_legacy(
        &self,
        config: &Config,
        client: Arc<Client>,
        nri: Option<Arc<dyn NriApi>>,
    ) -> ServiceResult<Arc<dyn CriService>>;
}

/// Factory for the built-in services.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl ServiceFactory for DefaultFactory {
    fn new_sandbox(&self, config: &Config, client: Arc<Client>) -> ServiceResult<Arc<dyn CriService>> {
        Ok(Arc::new(SandboxService::new(config, client)?))
    }

    fn new_legacy(
        &self,
        config: &Config,
        client: Arc<Client>,
        nri: Option<Arc<dyn NriApi>>,
    ) -> ServiceResult<Arc<dyn CriService>> {
        Ok(Arc::new(LegacyService::new(config, client, nri)?))
    }
}

/// Stops a [`CriService`] when the host shuts down.
pub(crate) struct ServiceCloser(pub(crate) Arc<dyn CriService>);

#[async_trait]
impl Closer for ServiceCloser {
    async fn close(&self) -> Result<(), BoxError> {
        self.0.close().await?;
        Ok(())
    }
}

// =============================================================================
// Serve Loop
// =============================================================================

/// Run/close plumbing shared by the built-in services.
#[derive(Debug)]
pub(crate) struct ServeLoop {
    mode: ServiceMode,
    root_dir: PathBuf,
    state_dir: PathBuf,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl ServeLoop {
    pub(crate) fn new(mode: ServiceMode, config: &Config) -> ServiceResult<Self> {
        if config.root_dir.as_os_str().is_empty() {
            return Err(ServiceError::InvalidConfig("root directory is not set".into()));
        }
        if config.state_dir.as_os_str().is_empty() {
            return Err(ServiceError::InvalidConfig("state directory is not set".into()));
        }
        Ok(Self {
            mode,
            root_dir: config.root_dir.clone(),
            state_dir: config.state_dir.clone(),
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        })
    }

    pub(crate) fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub(crate) async fn serve(&self) -> ServiceResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyRunning);
        }

        for dir in [&self.root_dir, &self.state_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ServiceError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
        }

        info!(
            mode = %self.mode,
            root = %self.root_dir.display(),
            state = %self.state_dir.display(),
            "CRI service started"
        );
        self.shutdown.cancelled().await;
        info!(mode = %self.mode, "CRI service stopped");
        Ok(())
    }

    pub(crate) fn close(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{PluginConfig, Runtime};
    use crate::testing::client;

    fn config(dir: &std::path::Path) -> Config {
        Config::new(
            PluginConfig::default(),
            dir.join("root/io.corral.grpc.v1.cri"),
            dir.join("state/io.corral.grpc.v1.cri"),
            "/run/corral/corral.sock",
        )
    }

    #[tokio::test]
    async fn test_run_until_closed() {
        let dir = tempfile::tempdir().unwrap();
        let service = DefaultFactory.new_legacy(&config(dir.path()), client(), None).unwrap();
        assert_eq!(service.mode(), ServiceMode::Legacy);

        let runner = Arc::clone(&service);
        let run = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dir.path().join("root/io.corral.grpc.v1.cri").is_dir());
        assert!(dir.path().join("state/io.corral.grpc.v1.cri").is_dir());
        assert!(!run.is_finished());

        service.close().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(matches!(service.run().await, Err(ServiceError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_closer_stops_service() {
        let dir = tempfile::tempdir().unwrap();
        let service = DefaultFactory.new_sandbox(&config(dir.path()), client()).unwrap();
        let closer = ServiceCloser(Arc::clone(&service));

        closer.close().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), service.run())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_sandbox_rejects_unknown_sandbox_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        let mut runtime = Runtime::new("io.containerd.kata.v2");
        runtime.sandbox_mode = "vm".into();
        config.plugin.containerd.runtimes.insert("kata".into(), runtime);

        assert!(matches!(
            SandboxService::new(&config, client()),
            Err(ServiceError::InvalidConfig(_))
        ));
        assert!(LegacyService::new(&config, client(), None).is_ok());
    }

    #[test]
    fn test_missing_directories_are_rejected() {
        let config = Config::new(PluginConfig::default(), "", "/run/cri", "");
        assert!(matches!(
            LegacyService::new(&config, client(), None),
            Err(ServiceError::InvalidConfig(_))
        ));
    }
}
