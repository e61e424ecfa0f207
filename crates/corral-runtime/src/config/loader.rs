//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults ([`HostConfig::default`])
//! 2. Programmatic base configuration ([`ConfigLoader::merge`])
//! 3. Config file (`corral.toml`, first match on the search paths)
//! 4. Environment variables (`CORRAL_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `CORRAL_` prefix with `__` as
//! separator:
//!
//! - `CORRAL_ROOT=/data/corral` → `root = "/data/corral"`
//! - `CORRAL_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! Plugin sections are keyed by plugin URI, which contains dots, so they can
//! only be set from the config file:
//!
//! ```toml
//! [plugins."io.corral.grpc.v1.cri".containerd]
//! default_runtime_name = "runc"
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use corral_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("/etc/corral/corral.toml")
//!     .with_env()
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HostConfig;

/// File name searched for on every search path.
pub const CONFIG_FILE_NAME: &str = "corral.toml";

/// Prefix of the environment variables the loader reads.
pub const ENV_PREFIX: &str = "CORRAL_";

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic configuration, merged right after the defaults.
    figment: Figment,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory (`~/.config/corral`) to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("corral"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    ///
    /// Merged values replace the defaults; the configuration file and the
    /// environment still override them.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = ConfigLoader::new()
    ///     .merge(HostConfig {
    ///         root: "/tmp/corral".into(),
    ///         ..Default::default()
    ///     })
    ///     .load()?;
    /// ```
    pub fn merge(mut self, config: HostConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<HostConfig> {
        let figment = self.build_figment()?;
        let config: HostConfig = figment.extract()?;

        debug!(
            root = %config.root.display(),
            state = %config.state.display(),
            logging_level = %config.logging.level,
            plugin_sections = config.plugins.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(HostConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(&path));
        } else {
            figment = self.load_config_file(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment)
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = vec![PathBuf::from("/etc/corral")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("corral"));
        }
        paths
    }

    /// Merges the first `corral.toml` found on the search paths.
    fn load_config_file(&self, figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            let path = search_path.join(CONFIG_FILE_NAME);
            if path.exists() {
                info!(path = %path.display(), "Loading configuration file");
                return figment.merge(Toml::file(path));
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }
}

/// Loads configuration from the default search paths and the environment.
pub fn load_config() -> ConfigResult<HostConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path` and the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<HostConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.root, PathBuf::from("/var/lib/corral"));
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .file("/nonexistent/corral.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_file_env_and_overrides_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "corral.toml",
                r#"
                    root = "/data/corral"
                    disabled_plugins = ["io.corral.nri.v1.nri"]

                    [logging]
                    level = "warn"

                    [plugins."io.corral.grpc.v1.cri".containerd]
                    default_runtime_name = "runc"
                "#,
            )?;
            jail.set_env("CORRAL_LOGGING__LEVEL", "debug");
            jail.set_env("CORRAL_STATE", "/tmp/corral-state");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.root, PathBuf::from("/data/corral"));
            assert_eq!(config.state, PathBuf::from("/tmp/corral-state"));
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.disabled_plugins, ["io.corral.nri.v1.nri"]);
            assert_eq!(
                config.plugins["io.corral.grpc.v1.cri"]["containerd"]["default_runtime_name"],
                "runc"
            );
            Ok(())
        });
    }

    #[test]
    fn test_merge_sits_between_defaults_and_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("corral.toml", r#"root = "/data/corral""#)?;
            jail.set_env("CORRAL_ADDRESS", "/run/env/corral.sock");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(HostConfig {
                    root: "/merged/root".into(),
                    state: "/merged/state".into(),
                    address: "/run/merged/corral.sock".into(),
                    ..Default::default()
                })
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.root, PathBuf::from("/data/corral"));
            assert_eq!(config.address, "/run/env/corral.sock");
            assert_eq!(config.state, PathBuf::from("/merged/state"));
            Ok(())
        });
    }
}
