//! CRI plugin startup.
//!
//! [`Startup::init`] runs once, from the plugin's init function, and walks
//! through the following states:
//!
//! ```text
//! Unvalidated ─► Validated ─► ClientReady ─┬─────────────────────────► ServiceConstructed ─► Running
//!                                          └─► CapabilityResolved ─┘                          │
//!                                              (legacy mode only)                   Degraded ◄┤
//!                                                                                     Failed ◄┘
//! ```
//!
//! Every failure up to `ServiceConstructed` is returned as an [`InitError`]
//! and nothing has been started.  After that the service run loop is spawned
//! and, in legacy mode, NRI is started; failures there cannot be returned to
//! the host any more and go to the [`FatalPolicy`] instead.

use std::error::Error as StdError;
use std::sync::Arc;

use corral_core::{InitContext, Platform, PluginError};
use corral_runtime::{
    Client, ClientError, LogBridgeError, LogLevel, SharedVerbosity, VerbositySink,
    bridge_verbosity,
};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

use crate::config::{Config, ConfigError, PluginConfig, validate_plugin_config};
use crate::constants::{
    CRI_VERSION, CRI_VERSION_ALPHA, EXPORT_CRI_VERSION, EXPORT_CRI_VERSION_ALPHA, K8S_NAMESPACE,
};
use crate::mode::ServiceMode;
use crate::nri::nri_for_legacy;
use crate::service::{CriService, DefaultFactory, ServiceCloser, ServiceError, ServiceFactory};

/// Where startup is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartupState {
    /// Configuration not checked yet.
    Unvalidated,
    /// Configuration accepted.
    Validated,
    /// Runtime client built.
    ClientReady,
    /// NRI looked up (legacy mode only).
    CapabilityResolved,
    /// Service built, nothing started.
    ServiceConstructed,
    /// Service running, with NRI when available.
    Running,
    /// Legacy service running without NRI.
    Degraded,
    /// A post-dispatch failure was reported to the fatal policy.
    Failed,
}

/// Errors returned by [`Startup::init`].
///
/// Each variant keeps its cause available through
/// [`source`](std::error::Error::source).
#[derive(Debug, Error)]
pub enum InitError {
    /// The plugin's configuration section does not decode.
    #[error("failed to decode plugin config: {0}")]
    Decode(#[source] PluginError),

    /// The plugin configuration is invalid.
    #[error("invalid plugin config: {0}")]
    InvalidConfig(#[source] ConfigError),

    /// The secondary logger rejected its settings.
    #[error("failed to set secondary log level: {0}")]
    LogBridge(#[source] LogBridgeError),

    /// The runtime client could not be built.
    #[error("failed to create runtime client: {0}")]
    Client(#[source] ClientError),

    /// The selected service could not be built.
    #[error("failed to create CRI service: {0}")]
    Service(#[source] ServiceError),
}

// =============================================================================
// Fatal Policy
// =============================================================================

/// What happens to failures after the service has been dispatched.
pub trait FatalPolicy: Send + Sync {
    /// Handles an unrecoverable failure.  `message` says what failed.
    fn fatal(&self, message: &str, error: &(dyn StdError + 'static));
}

/// Logs the failure and exits the process with status 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcess;

impl FatalPolicy for ExitProcess {
    fn fatal(&self, message: &str, error: &(dyn StdError + 'static)) {
        error!(error = %error, "{message}");
        std::process::exit(1);
    }
}

// =============================================================================
// Startup
// =============================================================================

/// Brings the CRI plugin up.
///
/// ```rust,ignore
/// let started = Startup::from_env().init(&ic).await?;
/// Ok(Instance::new(started.service()))
/// ```
pub struct Startup {
    mode: ServiceMode,
    factory: Arc<dyn ServiceFactory>,
    fatal: Arc<dyn FatalPolicy>,
    verbosity: Option<Arc<dyn VerbositySink>>,
    log_level: Option<LogLevel>,
}

impl Startup {
    /// Starts the built-in service for `mode`, exiting the process on
    /// post-dispatch failures.
    pub fn new(mode: ServiceMode) -> Self {
        Self {
            mode,
            factory: Arc::new(DefaultFactory),
            fatal: Arc::new(ExitProcess),
            verbosity: None,
            log_level: None,
        }
    }

    /// Like [`new`](Self::new), with the mode taken from the environment.
    pub fn from_env() -> Self {
        Self::new(ServiceMode::from_env())
    }

    /// Uses `factory` to build the service.
    pub fn factory(mut self, factory: Arc<dyn ServiceFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Uses `policy` for post-dispatch failures.
    pub fn fatal_policy(mut self, policy: Arc<dyn FatalPolicy>) -> Self {
        self.fatal = policy;
        self
    }

    /// Bridges the log level into `sink` instead of the process-wide
    /// [`SharedVerbosity`].
    pub fn verbosity_sink(mut self, sink: Arc<dyn VerbositySink>) -> Self {
        self.verbosity = Some(sink);
        self
    }

    /// Bridges `level` instead of the level of the installed subscriber.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// The mode this startup runs.
    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    /// Validates the configuration, builds the runtime client and the
    /// service, and dispatches it.
    ///
    /// Also publishes the plugin's platforms and CRI versions in its meta and
    /// registers a closer that stops the service on host shutdown.
    pub async fn init(&self, ic: &InitContext) -> Result<Started, InitError> {
        ic.set_platforms(vec![Platform::host_default()]);
        ic.export(EXPORT_CRI_VERSION, CRI_VERSION);
        ic.export(EXPORT_CRI_VERSION_ALPHA, CRI_VERSION_ALPHA);

        let mut state = StartupState::Unvalidated;

        let mut plugin_config: PluginConfig = ic.config().map_err(InitError::Decode)?;
        validate_plugin_config(&plugin_config).map_err(InitError::InvalidConfig)?;
        plugin_config.normalize();
        advance(&mut state, StartupState::Validated);

        let config = Config::new(plugin_config, ic.root(), ic.state(), ic.address());
        info!(config = ?config, "Start cri plugin with config");

        let level = self.log_level.unwrap_or_else(LogLevel::current);
        let bridged = match &self.verbosity {
            Some(sink) => bridge_verbosity(sink.as_ref(), level),
            None => bridge_verbosity(SharedVerbosity::global(), level),
        };
        bridged.map_err(InitError::LogBridge)?;

        info!(namespace = K8S_NAMESPACE, "Connect runtime services");
        let client = Client::builder()
            .default_namespace(K8S_NAMESPACE)
            .default_platform(Platform::host_default())
            .in_memory_services(ic)
            .build()
            .map_err(InitError::Client)?;
        let client = Arc::new(client);
        advance(&mut state, StartupState::ClientReady);

        let (service, nri) = match self.mode {
            ServiceMode::Sandbox => {
                info!("using experimental CRI Sandbox server - unset ENABLE_CRI_SANDBOXES to disable");
                let service = self
                    .factory
                    .new_sandbox(&config, client)
                    .map_err(InitError::Service)?;
                (service, None)
            }
            ServiceMode::Legacy => {
                info!("using legacy CRI server");
                let nri = nri_for_legacy(ic);
                advance(&mut state, StartupState::CapabilityResolved);
                let service = self
                    .factory
                    .new_legacy(&config, client, nri.clone())
                    .map_err(InitError::Service)?;
                (service, nri)
            }
        };
        advance(&mut state, StartupState::ServiceConstructed);

        ic.set_closer(Arc::new(ServiceCloser(Arc::clone(&service))));

        let run = {
            let service = Arc::clone(&service);
            let fatal = Arc::clone(&self.fatal);
            tokio::spawn(async move {
                match service.run().await {
                    Ok(()) => info!(mode = %service.mode(), "CRI service exited"),
                    Err(err) => fatal.fatal("Failed to run CRI service", &err),
                }
            })
        };

        match &nri {
            Some(nri) => {
                advance(&mut state, StartupState::Running);
                info!("using experimental NRI integration - disable nri plugin to prevent this");
                if let Err(err) = nri.start().await {
                    self.fatal.fatal("Failed to start NRI service", &*err);
                    advance(&mut state, StartupState::Failed);
                }
            }
            None if self.mode == ServiceMode::Legacy => {
                advance(&mut state, StartupState::Degraded);
            }
            None => advance(&mut state, StartupState::Running),
        }

        Ok(Started {
            service,
            run,
            mode: self.mode,
            state,
        })
    }
}

fn advance(state: &mut StartupState, next: StartupState) {
    debug!(from = ?*state, to = ?next, "CRI startup state changed");
    *state = next;
}

// =============================================================================
// Started
// =============================================================================

/// A dispatched CRI service.
pub struct Started {
    service: Arc<dyn CriService>,
    run: JoinHandle<()>,
    mode: ServiceMode,
    state: StartupState,
}

impl Started {
    /// The running service; this is the plugin's exported instance.
    pub fn service(&self) -> Arc<dyn CriService> {
        Arc::clone(&self.service)
    }

    /// Which service runs.
    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    /// [`StartupState::Running`], [`StartupState::Degraded`], or
    /// [`StartupState::Failed`] when NRI failed to start and the fatal
    /// policy returned.
    pub fn state(&self) -> StartupState {
        self.state
    }

    /// Waits for the service run loop to finish.
    pub async fn join(self) -> Result<(), JoinError> {
        self.run.await
    }
}
