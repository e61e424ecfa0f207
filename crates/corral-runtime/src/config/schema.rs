//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration structure of a Corral host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Persistent data directory; every plugin gets `<root>/<plugin uri>`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Runtime state directory; every plugin gets `<state>/<plugin uri>`.
    #[serde(default = "default_state")]
    pub state: PathBuf,

    /// Address plugins and clients use to reach the host.
    #[serde(default = "default_address")]
    pub address: String,

    /// Plugin URIs that must not be initialized.
    #[serde(default)]
    pub disabled_plugins: Vec<String>,

    /// Plugin URIs whose failure aborts startup.
    #[serde(default)]
    pub required_plugins: Vec<String>,

    /// Per-plugin configuration sections, keyed by plugin URI.
    #[serde(default)]
    pub plugins: HashMap<String, Value>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            state: default_state(),
            address: default_address(),
            disabled_plugins: Vec::new(),
            required_plugins: Vec::new(),
            plugins: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/var/lib/corral")
}

fn default_state() -> PathBuf {
    PathBuf::from("/run/corral")
}

fn default_address() -> String {
    "/run/corral/corral.sock".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Rotation policy for file output.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module level overrides, e.g. `corral_cri = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

/// Host log level.
///
/// `fatal` and `panic` are accepted for compatibility with existing
/// configuration files and behave like `error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Debugging detail.
    Debug,
    /// Normal operation milestones.
    #[default]
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
    /// Failures that terminate the process.
    Fatal,
    /// Failures that abort the process.
    Panic,
}

impl LogLevel {
    /// Returns the level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }

    /// Converts to the closest `tracing` level.
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error | Self::Fatal | Self::Panic => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated.
    #[default]
    Compact,
    /// Single-line with all fields.
    Full,
    /// Multi-line, human oriented.
    Pretty,
    /// Newline-delimited JSON (requires the `json-log` feature).
    #[cfg(feature = "json-log")]
    Json,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    Stdout,
    /// Standard error.
    #[default]
    Stderr,
    /// A file, see [`LoggingConfig::file_path`].
    File,
}

/// Rotation policy for file output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// A single, ever-growing file.
    #[default]
    Never,
    /// A new file every hour.
    Hourly,
    /// A new file every day.
    Daily,
}
