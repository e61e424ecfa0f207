//! CRI plugin startup against substitute services, NRI plugins and fatal
//! policies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use corral_core::{
    BoxError, InitContext, Instance, LoadedPlugin, Platform, PluginSet, PluginType,
};
use corral_cri::config::Config;
use corral_cri::constants::{EXPORT_CRI_VERSION, EXPORT_CRI_VERSION_ALPHA, NRI_PLUGIN_ID};
use corral_cri::service::ServiceResult;
use corral_cri::{
    CriService, FatalPolicy, InitError, NriApi, PLUGIN_ID, REGISTRATION, ServiceError,
    ServiceFactory, ServiceMode, Startup, StartupState,
};
use corral_runtime::client::EVENT_EXCHANGE;
use corral_runtime::{ClientError, LogBridgeError, LogLevel, REQUIRED_SERVICES, VerbositySink};
use parking_lot::Mutex;
use serde_json::{Value, json};

// =============================================================================
// Substitutes
// =============================================================================

struct FakeService {
    mode: ServiceMode,
    fail_run: bool,
}

#[async_trait]
impl CriService for FakeService {
    fn mode(&self) -> ServiceMode {
        self.mode
    }

    async fn run(&self) -> ServiceResult<()> {
        if self.fail_run {
            return Err(ServiceError::Other("listener closed".into()));
        }
        Ok(())
    }

    async fn close(&self) -> ServiceResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFactory {
    built: Mutex<Vec<(ServiceMode, bool)>>,
    configs: Mutex<Vec<Config>>,
    fail_new: bool,
    fail_run: bool,
}

impl RecordingFactory {
    fn build(&self, mode: ServiceMode, config: &Config, nri: bool) -> ServiceResult<Arc<dyn CriService>> {
        if self.fail_new {
            return Err(ServiceError::InvalidConfig("no runtime".into()));
        }
        self.built.lock().push((mode, nri));
        self.configs.lock().push(config.clone());
        Ok(Arc::new(FakeService {
            mode,
            fail_run: self.fail_run,
        }))
    }

    fn built(&self) -> Vec<(ServiceMode, bool)> {
        self.built.lock().clone()
    }
}

impl ServiceFactory for RecordingFactory {
    fn new_sandbox(
        &self,
        config: &Config,
        _client: Arc<corral_runtime::Client>,
    ) -> ServiceResult<Arc<dyn CriService>> {
        self.build(ServiceMode::Sandbox, config, false)
    }

    fn new_legacy(
        &self,
        config: &Config,
        client: Arc<corral_runtime::Client>,
        nri: Option<Arc<dyn NriApi>>,
    ) -> ServiceResult<Arc<dyn CriService>> {
        assert_eq!(client.default_namespace(), "k8s.io");
        self.build(ServiceMode::Legacy, config, nri.is_some())
    }
}

#[derive(Default)]
struct FakeNri {
    starts: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl NriApi for FakeNri {
    async fn start(&self) -> Result<(), BoxError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("nri socket unavailable".into());
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPolicy {
    calls: Mutex<Vec<(String, String)>>,
}

impl FatalPolicy for RecordingPolicy {
    fn fatal(&self, message: &str, error: &(dyn std::error::Error + 'static)) {
        self.calls.lock().push((message.to_string(), error.to_string()));
    }
}

#[derive(Default)]
struct RecordingSink {
    settings: Mutex<Vec<String>>,
    reject: bool,
}

impl VerbositySink for RecordingSink {
    fn set_to_stderr(&self, enabled: bool) -> Result<(), LogBridgeError> {
        self.settings.lock().push(format!("logtostderr={enabled}"));
        Ok(())
    }

    fn set_verbosity(&self, verbosity: u8) -> Result<(), LogBridgeError> {
        if self.reject {
            return Err(LogBridgeError {
                flag: "v",
                value: verbosity.to_string(),
                reason: "flag is locked".into(),
            });
        }
        self.settings.lock().push(format!("v={verbosity}"));
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn services() -> PluginSet {
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

fn with_nri(set: PluginSet, nri: Arc<FakeNri>) -> PluginSet {
    let api: Arc<dyn NriApi> = nri;
    set.with(LoadedPlugin::loaded(PluginType::NRI_API, NRI_PLUGIN_ID, Instance::new(api)))
}

fn cri_root(dir: &Path) -> PathBuf {
    dir.join("root").join("io.corral.grpc.v1.cri")
}

fn context(dir: &Path, config: Value, plugins: PluginSet) -> InitContext {
    InitContext::builder(PluginType::GRPC, PLUGIN_ID)
        .root(cri_root(dir))
        .state(dir.join("state").join("io.corral.grpc.v1.cri"))
        .address("/run/corral/corral.sock")
        .config(REGISTRATION.effective_config(Some(&config)))
        .plugins(plugins)
        .build()
}

fn startup(
    mode: ServiceMode,
    factory: &Arc<RecordingFactory>,
    policy: &Arc<RecordingPolicy>,
    sink: &Arc<RecordingSink>,
) -> Startup {
    Startup::new(mode)
        .factory(Arc::clone(factory) as Arc<dyn ServiceFactory>)
        .fatal_policy(Arc::clone(policy) as Arc<dyn FatalPolicy>)
        .verbosity_sink(Arc::clone(sink) as Arc<dyn VerbositySink>)
        .log_level(LogLevel::Info)
}

struct Harness {
    factory: Arc<RecordingFactory>,
    policy: Arc<RecordingPolicy>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new() -> Self {
        Self::with_factory(RecordingFactory::default())
    }

    fn with_factory(factory: RecordingFactory) -> Self {
        Self {
            factory: Arc::new(factory),
            policy: Arc::new(RecordingPolicy::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    fn startup(&self, mode: ServiceMode) -> Startup {
        startup(mode, &self.factory, &self.policy, &self.sink)
    }

    fn fatal_calls(&self) -> Vec<(String, String)> {
        self.policy.calls.lock().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_invalid_config_stops_before_client_and_service() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let config = json!({
        "containerd": {
            "untrusted_workload_runtime": { "runtime_type": "io.containerd.runsc.v1" },
            "runtimes": { "untrusted": { "runtime_type": "io.containerd.runsc.v1" } },
        }
    });
    let ic = context(dir.path(), config, services());

    let err = harness.startup(ServiceMode::Legacy).init(&ic).await.err().unwrap();

    assert!(matches!(err, InitError::InvalidConfig(_)));
    assert!(err.to_string().starts_with("invalid plugin config: "));
    assert!(std::error::Error::source(&err).is_some());
    assert!(harness.factory.built().is_empty());
    assert!(harness.sink.settings.lock().is_empty());
    assert!(ic.closer().get().is_none());
}

#[tokio::test]
async fn test_undecodable_config() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let ic = context(dir.path(), json!({ "max_concurrent_downloads": "many" }), services());

    let err = harness.startup(ServiceMode::Legacy).init(&ic).await.err().unwrap();
    assert!(matches!(err, InitError::Decode(_)));
    assert!(harness.factory.built().is_empty());
}

#[tokio::test]
async fn test_legacy_without_nri_is_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let ic = context(dir.path(), json!({}), services());

    let started = harness.startup(ServiceMode::Legacy).init(&ic).await.unwrap();

    assert_eq!(started.mode(), ServiceMode::Legacy);
    assert_eq!(started.state(), StartupState::Degraded);
    assert_eq!(started.service().mode(), ServiceMode::Legacy);
    assert_eq!(harness.factory.built(), [(ServiceMode::Legacy, false)]);
    assert!(ic.closer().get().is_some());

    started.join().await.unwrap();
    assert!(harness.fatal_calls().is_empty());
}

#[tokio::test]
async fn test_sandbox_ignores_nri() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let nri = Arc::new(FakeNri::default());
    let ic = context(dir.path(), json!({}), with_nri(services(), Arc::clone(&nri)));

    let started = harness.startup(ServiceMode::Sandbox).init(&ic).await.unwrap();

    assert_eq!(started.state(), StartupState::Running);
    assert_eq!(harness.factory.built(), [(ServiceMode::Sandbox, false)]);
    assert_eq!(nri.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_legacy_with_nri_starts_it() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let nri = Arc::new(FakeNri::default());
    let ic = context(dir.path(), json!({}), with_nri(services(), Arc::clone(&nri)));

    let started = harness.startup(ServiceMode::Legacy).init(&ic).await.unwrap();

    assert_eq!(started.state(), StartupState::Running);
    assert_eq!(harness.factory.built(), [(ServiceMode::Legacy, true)]);
    assert_eq!(nri.starts.load(Ordering::SeqCst), 1);
    started.join().await.unwrap();
    assert!(harness.fatal_calls().is_empty());
}

#[tokio::test]
async fn test_nri_start_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let nri = Arc::new(FakeNri {
        fail: true,
        ..Default::default()
    });
    let ic = context(dir.path(), json!({}), with_nri(services(), nri));

    let started = harness.startup(ServiceMode::Legacy).init(&ic).await.unwrap();

    assert_eq!(started.state(), StartupState::Failed);
    assert_eq!(
        harness.fatal_calls(),
        [(
            "Failed to start NRI service".to_string(),
            "nri socket unavailable".to_string()
        )]
    );
}

#[tokio::test]
async fn test_incompatible_nri_plugin_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let plugins = services().with(LoadedPlugin::loaded(
        PluginType::NRI_API,
        NRI_PLUGIN_ID,
        Instance::new(Arc::new("not nri".to_string())),
    ));
    let ic = context(dir.path(), json!({}), plugins);

    let started = harness.startup(ServiceMode::Legacy).init(&ic).await.unwrap();

    assert_eq!(started.state(), StartupState::Degraded);
    assert_eq!(harness.factory.built(), [(ServiceMode::Legacy, false)]);
}

#[tokio::test]
async fn test_run_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_factory(RecordingFactory {
        fail_run: true,
        ..Default::default()
    });
    let ic = context(dir.path(), json!({}), services());

    let started = harness.startup(ServiceMode::Sandbox).init(&ic).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), started.join())
        .await
        .unwrap()
        .unwrap();

    let calls = harness.fatal_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "Failed to run CRI service");
    assert!(calls[0].1.contains("listener closed"));
}

#[tokio::test]
async fn test_service_construction_failure() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::with_factory(RecordingFactory {
        fail_new: true,
        ..Default::default()
    });
    let ic = context(dir.path(), json!({}), services());

    let err = harness.startup(ServiceMode::Legacy).init(&ic).await.err().unwrap();
    assert!(matches!(err, InitError::Service(ServiceError::InvalidConfig(_))));
    assert!(err.to_string().starts_with("failed to create CRI service: "));
    assert!(ic.closer().get().is_none());
}

#[tokio::test]
async fn test_missing_service_fails_client() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let plugins = PluginSet::new().with(LoadedPlugin::loaded(
        PluginType::EVENT,
        EVENT_EXCHANGE,
        Instance::new(Arc::new(())),
    ));
    let ic = context(dir.path(), json!({}), plugins);

    let err = harness.startup(ServiceMode::Legacy).init(&ic).await.err().unwrap();
    assert!(matches!(err, InitError::Client(ClientError::ServiceNotFound { .. })));
    assert!(harness.factory.built().is_empty());
}

#[tokio::test]
async fn test_log_bridge_failure_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness {
        sink: Arc::new(RecordingSink {
            reject: true,
            ..Default::default()
        }),
        ..Harness::new()
    };
    let ic = context(dir.path(), json!({}), services());

    let err = harness.startup(ServiceMode::Legacy).init(&ic).await.err().unwrap();
    assert!(matches!(err, InitError::LogBridge(_)));
    assert!(harness.factory.built().is_empty());
}

#[tokio::test]
async fn test_verbosity_follows_log_level() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let ic = context(dir.path(), json!({}), services());

    harness
        .startup(ServiceMode::Legacy)
        .log_level(LogLevel::Trace)
        .init(&ic)
        .await
        .unwrap();

    assert_eq!(*harness.sink.settings.lock(), ["logtostderr=true", "v=5"]);
}

#[tokio::test]
async fn test_assembled_config_and_meta() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new();
    let ic = context(
        dir.path(),
        json!({ "containerd": { "snapshotter": "native" } }),
        services(),
    );

    harness.startup(ServiceMode::Legacy).init(&ic).await.unwrap();

    let configs = harness.factory.configs.lock();
    let config = &configs[0];
    assert_eq!(config.root_dir, cri_root(dir.path()));
    assert_eq!(config.corral_root_dir, dir.path().join("root"));
    assert_eq!(config.corral_endpoint, "/run/corral/corral.sock");
    assert_eq!(config.plugin.containerd.snapshotter, "native");
    assert_eq!(config.plugin.containerd.default_runtime_name, "runc");

    let meta = ic.meta();
    assert_eq!(meta.platforms, [Platform::host_default()]);
    assert_eq!(meta.exports[EXPORT_CRI_VERSION], "v1");
    assert_eq!(meta.exports[EXPORT_CRI_VERSION_ALPHA], "v1alpha2");
}
