//! Plugin configuration validation.

use tracing::warn;

use super::duration::parse_duration;
use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BlockIoConfig, ContainerdConfig, PluginConfig, RUNTIME_DEFAULT, RUNTIME_UNTRUSTED,
    RegistryConfig,
};

/// Validates a plugin configuration, returning the first invalid field.
pub fn validate_plugin_config(config: &PluginConfig) -> ConfigResult<()> {
    validate_runtimes(&config.containerd)?;
    validate_registry(&config.registry)?;
    validate_timeouts(config)?;
    validate_streaming(config)?;
    if config.max_concurrent_downloads == 0 {
        return Err(ConfigError::NoConcurrentDownloads);
    }
    if let Some(blockio) = &config.blockio {
        validate_blockio(blockio)?;
    }
    Ok(())
}

fn validate_runtimes(containerd: &ContainerdConfig) -> ConfigResult<()> {
    if containerd.untrusted_workload_runtime.is_some() {
        warn!("`untrusted_workload_runtime` is deprecated, use `runtimes.untrusted` instead");
        if containerd.runtimes.contains_key(RUNTIME_UNTRUSTED) {
            return Err(ConfigError::ConflictingRuntime {
                field: "untrusted_workload_runtime",
                runtime: RUNTIME_UNTRUSTED,
            });
        }
    }

    // `normalize` makes the deprecated field the default runtime.
    if containerd.default_runtime.is_some() {
        warn!("`default_runtime` is deprecated, use `runtimes.default` instead");
        if containerd.runtimes.contains_key(RUNTIME_DEFAULT) {
            return Err(ConfigError::ConflictingRuntime {
                field: "default_runtime",
                runtime: RUNTIME_DEFAULT,
            });
        }
    } else {
        if containerd.default_runtime_name.is_empty() {
            return Err(ConfigError::MissingDefaultRuntimeName);
        }
        if !containerd
            .runtimes
            .contains_key(&containerd.default_runtime_name)
        {
            return Err(ConfigError::UnknownDefaultRuntime(
                containerd.default_runtime_name.clone(),
            ));
        }
    }

    if let Some((name, _)) = containerd.runtimes.iter().find(|(_, r)| {
        r.privileged_without_host_devices_all_devices_allowed && !r.privileged_without_host_devices
    }) {
        return Err(ConfigError::AllDevicesWithoutHostDevices(name.clone()));
    }
    Ok(())
}

fn validate_registry(registry: &RegistryConfig) -> ConfigResult<()> {
    if registry.config_path.is_empty() {
        if !registry.mirrors.is_empty() {
            warn!("`registry.mirrors` is deprecated, use `registry.config_path` instead");
        }
        return Ok(());
    }
    if !registry.mirrors.is_empty() {
        return Err(ConfigError::MirrorsWithConfigPath);
    }
    if registry.configs.values().any(|c| c.tls.is_some()) {
        return Err(ConfigError::TlsWithConfigPath);
    }
    Ok(())
}

fn validate_timeouts(config: &PluginConfig) -> ConfigResult<()> {
    let fields = [
        ("stream_idle_timeout", &config.stream_idle_timeout),
        ("image_pull_progress_timeout", &config.image_pull_progress_timeout),
        ("drain_exec_sync_io_timeout", &config.drain_exec_sync_io_timeout),
    ];
    for (field, value) in fields {
        if value.is_empty() {
            continue;
        }
        parse_duration(value).map_err(|source| ConfigError::InvalidDuration { field, source })?;
    }
    Ok(())
}

fn validate_streaming(config: &PluginConfig) -> ConfigResult<()> {
    let pair = &config.x509_key_pair_streaming;
    if pair.tls_cert_file.is_empty() != pair.tls_key_file.is_empty() {
        return Err(ConfigError::IncompleteKeyPair);
    }
    Ok(())
}

fn validate_blockio(blockio: &BlockIoConfig) -> ConfigResult<()> {
    for (class, settings) in &blockio.classes {
        let weights = settings
            .weight
            .into_iter()
            .chain(settings.devices.iter().filter_map(|d| d.weight));
        for weight in weights {
            if !(10..=1000).contains(&weight) {
                return Err(ConfigError::BlockIoWeight {
                    class: class.clone(),
                    weight,
                });
            }
        }
    }
    Ok(())
}
