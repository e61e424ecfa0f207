//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{HostConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HostConfig) -> ConfigResult<()> {
    validate_directories(config)?;
    validate_plugin_lists(config)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates the root and state directories.
fn validate_directories(config: &HostConfig) -> ConfigResult<()> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("root"));
    }
    if config.state.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("state"));
    }
    if !config.root.is_absolute() {
        return Err(ConfigError::validation(format!(
            "root must be an absolute path: {}",
            config.root.display()
        )));
    }
    if !config.state.is_absolute() {
        return Err(ConfigError::validation(format!(
            "state must be an absolute path: {}",
            config.state.display()
        )));
    }
    if config.root == config.state {
        return Err(ConfigError::validation(
            "root and state must be different directories",
        ));
    }
    if config.address.is_empty() {
        return Err(ConfigError::missing_field("address"));
    }
    Ok(())
}

/// Rejects a plugin that is both disabled and required.
fn validate_plugin_lists(config: &HostConfig) -> ConfigResult<()> {
    let disabled: HashSet<&str> = config.disabled_plugins.iter().map(String::as_str).collect();
    if let Some(uri) = config
        .required_plugins
        .iter()
        .find(|uri| disabled.contains(uri.as_str()))
    {
        return Err(ConfigError::validation(format!(
            "plugin {uri} is listed in both disabled_plugins and required_plugins"
        )));
    }
    Ok(())
}

/// Validates logging configuration.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    if logging.filters.keys().any(String::is_empty) {
        return Err(ConfigError::validation("Log filter module cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&HostConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_relative_root() {
        let config = HostConfig {
            root: PathBuf::from("var/lib/corral"),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validate_root_equals_state() {
        let config = HostConfig {
            root: PathBuf::from("/srv/corral"),
            state: PathBuf::from("/srv/corral"),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_disabled_and_required() {
        let config = HostConfig {
            disabled_plugins: vec!["io.corral.grpc.v1.cri".into()],
            required_plugins: vec!["io.corral.grpc.v1.cri".into()],
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = HostConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { ref field }) if field == "logging.file_path"
        ));
    }
}
