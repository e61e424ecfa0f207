//! Block-I/O classes.
//!
//! A container is put in a block-I/O class through annotations.  The most
//! specific one wins:
//!
//! 1. the container annotation `io.kubernetes.cri.blockio-class`;
//! 2. the pod annotation `blockio.resources.beta.kubernetes.io/container.<name>`;
//! 3. the pod annotation `blockio.resources.beta.kubernetes.io/pod`.
//!
//! The class is then translated into the OCI `linux.blockIO` settings
//! configured for it.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{BlockIoClass, PluginConfig};

/// Container annotation naming the container's class.
pub const CONTAINER_ANNOTATION: &str = "io.kubernetes.cri.blockio-class";

/// Prefix of the pod annotation naming one container's class.
pub const POD_CONTAINER_ANNOTATION_PREFIX: &str = "blockio.resources.beta.kubernetes.io/container.";

/// Pod annotation naming the class of every container in the pod.
pub const POD_ANNOTATION: &str = "blockio.resources.beta.kubernetes.io/pod";

/// Errors from resolving a container's block-I/O class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockIoError {
    /// A class was requested but block I/O control is disabled.
    #[error("blockio disabled, refusing to set blockio class of container {container:?} to {class:?}")]
    Disabled {
        /// Container name.
        container: String,
        /// Requested class.
        class: String,
    },

    /// The class is not configured.
    #[error("blockio class {0:?} is not configured")]
    UnknownClass(String),
}

// =============================================================================
// OCI Structures
// =============================================================================

/// OCI `linux.blockIO`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxBlockIo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaf_weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weight_device: Vec<LinuxWeightDevice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throttle_read_bps_device: Vec<LinuxThrottleDevice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throttle_write_bps_device: Vec<LinuxThrottleDevice>,
    #[serde(rename = "throttleReadIOPSDevice", default, skip_serializing_if = "Vec::is_empty")]
    pub throttle_read_iops_device: Vec<LinuxThrottleDevice>,
    #[serde(rename = "throttleWriteIOPSDevice", default, skip_serializing_if = "Vec::is_empty")]
    pub throttle_write_iops_device: Vec<LinuxThrottleDevice>,
}

/// Per-device weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxWeightDevice {
    pub major: i64,
    pub minor: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaf_weight: Option<u16>,
}

/// Per-device rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxThrottleDevice {
    pub major: i64,
    pub minor: i64,
    pub rate: u64,
}

impl From<&BlockIoClass> for LinuxBlockIo {
    fn from(class: &BlockIoClass) -> Self {
        let mut oci = LinuxBlockIo {
            weight: class.weight,
            ..Default::default()
        };

        for device in &class.devices {
            let throttle = |rate| LinuxThrottleDevice {
                major: device.major,
                minor: device.minor,
                rate,
            };
            if device.weight.is_some() {
                oci.weight_device.push(LinuxWeightDevice {
                    major: device.major,
                    minor: device.minor,
                    weight: device.weight,
                    leaf_weight: None,
                });
            }
            oci.throttle_read_bps_device
                .extend(device.throttle_read_bps.map(throttle));
            oci.throttle_write_bps_device
                .extend(device.throttle_write_bps.map(throttle));
            oci.throttle_read_iops_device
                .extend(device.throttle_read_iops.map(throttle));
            oci.throttle_write_iops_device
                .extend(device.throttle_write_iops.map(throttle));
        }
        oci
    }
}

// =============================================================================
// Class Resolution
// =============================================================================

/// The class named by a container's annotations, if any.
///
/// Empty annotation values are ignored.
pub fn class_from_annotations(
    container_name: &str,
    container_annotations: &HashMap<String, String>,
    pod_annotations: &HashMap<String, String>,
) -> Option<String> {
    let pod_container_key = format!("{POD_CONTAINER_ANNOTATION_PREFIX}{container_name}");
    [
        container_annotations.get(CONTAINER_ANNOTATION),
        pod_annotations.get(&pod_container_key),
        pod_annotations.get(POD_ANNOTATION),
    ]
    .into_iter()
    .flatten()
    .find(|class| !class.is_empty())
    .cloned()
}

/// Block-I/O settings of a CRI service.
#[derive(Debug, Clone, Default)]
pub struct BlockIo {
    classes: Option<BTreeMap<String, BlockIoClass>>,
    ignore_not_enabled: bool,
}

impl BlockIo {
    /// Takes the configured classes and the `ignore_blockio_not_enabled_errors`
    /// flag from `config`.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            classes: config.blockio.as_ref().map(|b| b.classes.clone()),
            ignore_not_enabled: config.containerd.ignore_blockio_not_enabled_errors,
        }
    }

    /// Whether block I/O control is enabled.
    pub fn is_enabled(&self) -> bool {
        self.classes.is_some()
    }

    /// Resolves the class a container should be placed in.
    ///
    /// While block I/O control is disabled a requested class is an error,
    /// unless `ignore_blockio_not_enabled_errors` is set, in which case the
    /// class is dropped.
    pub fn class_from_annotations(
        &self,
        container_name: &str,
        container_annotations: &HashMap<String, String>,
        pod_annotations: &HashMap<String, String>,
    ) -> Result<Option<String>, BlockIoError> {
        let Some(class) =
            class_from_annotations(container_name, container_annotations, pod_annotations)
        else {
            return Ok(None);
        };

        let Some(classes) = &self.classes else {
            if self.ignore_not_enabled {
                debug!(
                    container = container_name,
                    class = %class,
                    "Block I/O is disabled, ignoring blockio class"
                );
                return Ok(None);
            }
            return Err(BlockIoError::Disabled {
                container: container_name.to_string(),
                class,
            });
        };

        if !classes.contains_key(&class) {
            return Err(BlockIoError::UnknownClass(class));
        }
        Ok(Some(class))
    }

    /// The OCI settings of `class`.
    pub fn to_linux_oci(&self, class: &str) -> Result<LinuxBlockIo, BlockIoError> {
        self.classes
            .as_ref()
            .and_then(|classes| classes.get(class))
            .map(LinuxBlockIo::from)
            .ok_or_else(|| BlockIoError::UnknownClass(class.to_string()))
    }
}
