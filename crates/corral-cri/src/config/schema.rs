//! CRI plugin configuration schema.
//!
//! The plugin's section of the host configuration (`[plugins."io.corral.grpc.v1.cri"]`)
//! decodes into [`PluginConfig`].  Every field has a default, so an empty
//! section yields a working configuration with a single `runc` runtime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the runtime the deprecated `default_runtime` field is moved to.
pub const RUNTIME_DEFAULT: &str = "default";

/// Name of the runtime the deprecated `untrusted_workload_runtime` field is
/// moved to.
pub const RUNTIME_UNTRUSTED: &str = "untrusted";

/// Runtime used when nothing else is configured.
pub const DEFAULT_RUNTIME_NAME: &str = "runc";

/// Shim type of [`DEFAULT_RUNTIME_NAME`].
pub const DEFAULT_RUNTIME_TYPE: &str = "io.containerd.runc.v2";

// =============================================================================
// Plugin Configuration
// =============================================================================

/// Configuration of the CRI plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Runtime selection and snapshotter settings.
    pub containerd: ContainerdConfig,

    /// Pod network (CNI) settings.
    pub cni: CniConfig,

    /// Image registry settings.
    pub registry: RegistryConfig,

    /// Disables the TCP listener of the CRI API.
    pub disable_tcp_service: bool,

    /// Address the streaming server listens on.
    pub stream_server_address: String,

    /// Port the streaming server listens on (`0` picks a free one).
    pub stream_server_port: String,

    /// Idle timeout of streaming connections (Go duration syntax).
    pub stream_idle_timeout: String,

    /// Serves exec/attach/port-forward over TLS.
    pub enable_tls_streaming: bool,

    /// Certificate and key for TLS streaming.
    pub x509_key_pair_streaming: X509KeyPairStreaming,

    /// Pause image used for pod sandboxes.
    pub sandbox_image: String,

    /// Seconds between container statistics collections.
    pub stats_collect_period: u32,

    /// Longest container log line kept before splitting (`-1` disables the limit).
    pub max_container_log_line_size: i64,

    /// Maximum number of layer downloads per image pull.
    pub max_concurrent_downloads: u32,

    /// Cancels an image pull that made no progress for this long.
    pub image_pull_progress_timeout: String,

    /// How long exec sync waits for I/O to drain after the process exits.
    pub drain_exec_sync_io_timeout: String,

    /// Enables SELinux labeling of containers.
    pub enable_selinux: bool,

    /// Maximum category number used for SELinux labels.
    pub selinux_category_range: u32,

    /// Skips cgroup setup for containers.
    pub disable_cgroup: bool,

    /// Skips AppArmor profiles.
    pub disable_apparmor: bool,

    /// Caps container OOM score adjustments at the daemon's own value.
    pub restrict_oom_score_adj: bool,

    /// Ignores the kubelet's proc mount request and always uses the default.
    pub disable_proc_mount: bool,

    /// Mounts image-defined volumes as host directories unless set.
    pub ignore_image_defined_volumes: bool,

    /// Allows unprivileged processes to bind low ports inside pods.
    pub enable_unprivileged_ports: bool,

    /// Allows unprivileged ICMP sockets inside pods.
    pub enable_unprivileged_icmp: bool,

    /// Enables Container Device Interface injection.
    pub enable_cdi: bool,

    /// Directories searched for CDI specs.
    pub cdi_spec_dirs: Vec<PathBuf>,

    /// Block-I/O classes; block I/O control is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockio: Option<BlockIoConfig>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            containerd: ContainerdConfig::default(),
            cni: CniConfig::default(),
            registry: RegistryConfig::default(),
            disable_tcp_service: true,
            stream_server_address: "127.0.0.1".to_string(),
            stream_server_port: "0".to_string(),
            stream_idle_timeout: "4h0m0s".to_string(),
            enable_tls_streaming: false,
            x509_key_pair_streaming: X509KeyPairStreaming::default(),
            sandbox_image: "registry.k8s.io/pause:3.8".to_string(),
            stats_collect_period: 10,
            max_container_log_line_size: 16 * 1024,
            max_concurrent_downloads: 3,
            image_pull_progress_timeout: "5m0s".to_string(),
            drain_exec_sync_io_timeout: "0s".to_string(),
            enable_selinux: false,
            selinux_category_range: 1024,
            disable_cgroup: false,
            disable_apparmor: false,
            restrict_oom_score_adj: false,
            disable_proc_mount: false,
            ignore_image_defined_volumes: false,
            enable_unprivileged_ports: false,
            enable_unprivileged_icmp: false,
            enable_cdi: false,
            cdi_spec_dirs: vec![PathBuf::from("/etc/cdi"), PathBuf::from("/var/run/cdi")],
            blockio: None,
        }
    }
}

impl PluginConfig {
    /// Moves the deprecated `default_runtime` and `untrusted_workload_runtime`
    /// fields into `containerd.runtimes`.
    ///
    /// Only meaningful on a configuration that passed
    /// [`validate_plugin_config`](super::validate_plugin_config), which
    /// rejects the conflicting combinations.
    pub fn normalize(&mut self) {
        let containerd = &mut self.containerd;
        if let Some(untrusted) = containerd.untrusted_workload_runtime.take() {
            containerd
                .runtimes
                .insert(RUNTIME_UNTRUSTED.to_string(), untrusted);
        }
        if let Some(default) = containerd.default_runtime.take() {
            containerd
                .runtimes
                .insert(RUNTIME_DEFAULT.to_string(), default);
            containerd.default_runtime_name = RUNTIME_DEFAULT.to_string();
        }
    }

    /// Whether block-I/O classes are configured.
    pub fn blockio_enabled(&self) -> bool {
        self.blockio.is_some()
    }

    /// The default configuration as a JSON value, used as the registration's
    /// default section.
    pub fn default_value() -> Value {
        serde_json::to_value(Self::default()).unwrap_or_default()
    }
}

// =============================================================================
// Runtimes
// =============================================================================

/// Runtime selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerdConfig {
    /// Snapshotter used for container filesystems.
    pub snapshotter: String,

    /// Runtime used when a pod does not ask for one.
    pub default_runtime_name: String,

    /// Deprecated: use `runtimes.default` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_runtime: Option<Runtime>,

    /// Deprecated: use `runtimes.untrusted` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untrusted_workload_runtime: Option<Runtime>,

    /// Runtimes by handler name.
    pub runtimes: BTreeMap<String, Runtime>,

    /// Disables pivot_root when creating containers.
    pub no_pivot: bool,

    /// Skips passing snapshot annotations to the snapshotter.
    pub disable_snapshot_annotations: bool,

    /// Removes compressed layers from the content store once unpacked.
    pub discard_unpacked_layers: bool,

    /// Drops block-I/O classes instead of failing when block I/O is disabled.
    pub ignore_blockio_not_enabled_errors: bool,

    /// Drops RDT classes instead of failing when RDT is disabled.
    pub ignore_rdt_not_enabled_errors: bool,
}

impl Default for ContainerdConfig {
    fn default() -> Self {
        Self {
            snapshotter: "overlayfs".to_string(),
            default_runtime_name: DEFAULT_RUNTIME_NAME.to_string(),
            default_runtime: None,
            untrusted_workload_runtime: None,
            runtimes: BTreeMap::from([(
                DEFAULT_RUNTIME_NAME.to_string(),
                Runtime::new(DEFAULT_RUNTIME_TYPE),
            )]),
            no_pivot: false,
            disable_snapshot_annotations: true,
            discard_unpacked_layers: false,
            ignore_blockio_not_enabled_errors: false,
            ignore_rdt_not_enabled_errors: false,
        }
    }
}

/// A runtime handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Runtime {
    /// Shim type, e.g. `io.containerd.runc.v2`.
    pub runtime_type: String,

    /// Path of the shim binary, if not on `PATH`.
    pub runtime_path: String,

    /// Pod annotations passed through to the runtime.
    pub pod_annotations: Vec<String>,

    /// Container annotations passed through to the runtime.
    pub container_annotations: Vec<String>,

    /// Privileged containers do not get the host's devices.
    pub privileged_without_host_devices: bool,

    /// With `privileged_without_host_devices`, still allow every device in
    /// the device cgroup.
    pub privileged_without_host_devices_all_devices_allowed: bool,

    /// OCI spec file used as the base for containers.
    pub base_runtime_spec: String,

    /// CNI configuration directory for pods using this runtime.
    pub cni_conf_dir: String,

    /// Maximum number of CNI configuration files loaded from `cni_conf_dir`.
    pub cni_max_conf_num: u32,

    /// Snapshotter override for this runtime.
    pub snapshotter: String,

    /// Sandbox implementation: `podsandbox` or `shim`.
    pub sandbox_mode: String,

    /// Shim-specific options.
    pub options: BTreeMap<String, Value>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            runtime_type: String::new(),
            runtime_path: String::new(),
            pod_annotations: Vec::new(),
            container_annotations: Vec::new(),
            privileged_without_host_devices: false,
            privileged_without_host_devices_all_devices_allowed: false,
            base_runtime_spec: String::new(),
            cni_conf_dir: String::new(),
            cni_max_conf_num: 0,
            snapshotter: String::new(),
            sandbox_mode: "podsandbox".to_string(),
            options: BTreeMap::new(),
        }
    }
}

impl Runtime {
    /// Creates a runtime of the given shim type.
    pub fn new(runtime_type: impl Into<String>) -> Self {
        Self {
            runtime_type: runtime_type.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// CNI
// =============================================================================

/// Pod network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CniConfig {
    /// Directory holding CNI plugin binaries.
    pub bin_dir: PathBuf,
    /// Directory holding CNI network configurations.
    pub conf_dir: PathBuf,
    /// Maximum number of configuration files loaded (`0` loads all).
    pub max_conf_num: u32,
    /// Template rendered into `conf_dir` once the node's pod CIDR is known.
    pub conf_template: String,
    /// IP family preference: `ipv4`, `ipv6` or `cni`.
    pub ip_pref: String,
}

impl Default for CniConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("/opt/cni/bin"),
            conf_dir: PathBuf::from("/etc/cni/net.d"),
            max_conf_num: 1,
            conf_template: String::new(),
            ip_pref: String::new(),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Image registry settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory of per-host `hosts.toml` files.
    pub config_path: String,
    /// Deprecated: registry mirrors by host name.
    pub mirrors: BTreeMap<String, Mirror>,
    /// Per-registry TLS and auth settings.
    pub configs: BTreeMap<String, RegistryHostConfig>,
}

/// Endpoints serving a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mirror {
    /// Endpoint URLs, tried in order.
    pub endpoint: Vec<String>,
}

/// TLS and auth settings of one registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryHostConfig {
    /// Deprecated: use `config_path` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

/// Client TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub insecure_skip_verify: bool,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
}

/// Registry credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub auth: String,
    pub identitytoken: String,
}

// =============================================================================
// Streaming TLS
// =============================================================================

/// Certificate and key of the streaming server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct X509KeyPairStreaming {
    pub tls_cert_file: String,
    pub tls_key_file: String,
}

// =============================================================================
// Block I/O
// =============================================================================

/// Block-I/O classes containers can be assigned to through annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockIoConfig {
    /// Classes by name.
    pub classes: BTreeMap<String, BlockIoClass>,
}

/// Weights and throttling applied to a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockIoClass {
    /// Proportional weight, 10..=1000.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    /// Per-device overrides.
    pub devices: Vec<BlockIoDevice>,
}

/// Settings for one block device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockIoDevice {
    pub major: i64,
    pub minor: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_read_bps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_write_bps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_read_iops: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_write_iops: Option<u64>,
}

// =============================================================================
// Assembled Configuration
// =============================================================================

/// Everything the CRI services are constructed from: the validated plugin
/// configuration plus the directories and endpoint the host assigned.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Validated plugin configuration.
    #[serde(flatten)]
    pub plugin: PluginConfig,
    /// Root directory of the whole runtime, the parent of `root_dir`.
    pub corral_root_dir: PathBuf,
    /// Address of the runtime's own API.
    pub corral_endpoint: String,
    /// Persistent directory of the CRI plugin.
    pub root_dir: PathBuf,
    /// Volatile directory of the CRI plugin.
    pub state_dir: PathBuf,
}

impl Config {
    /// Assembles a configuration; `corral_root_dir` is derived from `root_dir`.
    pub fn new(
        plugin: PluginConfig,
        root_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        corral_endpoint: impl Into<String>,
    ) -> Self {
        let root_dir = root_dir.into();
        Self {
            plugin,
            corral_root_dir: parent_dir(&root_dir),
            corral_endpoint: corral_endpoint.into(),
            root_dir,
            state_dir: state_dir.into(),
        }
    }
}

/// Parent of `path`, with `/` as its own parent and `.` for bare names.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None if path.as_os_str().is_empty() => PathBuf::from("."),
        None => path.to_path_buf(),
    }
}
