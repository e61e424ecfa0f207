//! OCI platform descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An OCI image platform (`os/architecture[/variant]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// OCI architecture name, e.g. `amd64`.
    pub architecture: String,
    /// Optional CPU variant, e.g. `v8` for `arm64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// Creates a platform without a variant.
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
        }
    }

    /// Sets the CPU variant.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// The platform of the running host, using OCI architecture names.
    pub fn host_default() -> Self {
        let platform = Self::from_rust(
            std::env::consts::OS,
            std::env::consts::ARCH,
            cfg!(target_endian = "little"),
        );
        match host_arm_variant() {
            Some(variant) if platform.architecture == "arm" => platform.with_variant(variant),
            _ => platform,
        }
    }

    /// Maps Rust's `target_os`/`target_arch` names to the OCI ones.
    ///
    /// 32-bit `arm` gets no variant here; the host's variant depends on the
    /// target features it was built with.
    pub fn from_rust(os: &str, arch: &str, little_endian: bool) -> Self {
        let (architecture, variant) = match arch {
            "x86_64" => ("amd64", None),
            "x86" => ("386", None),
            "aarch64" => ("arm64", Some("v8")),
            "powerpc64" if little_endian => ("ppc64le", None),
            "powerpc64" => ("ppc64", None),
            "mips64" if little_endian => ("mips64le", None),
            "mips" if little_endian => ("mipsle", None),
            other => (other, None),
        };
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let platform = Self::new(os, architecture);
        match variant {
            Some(v) => platform.with_variant(v),
            None => platform,
        }
    }
}

fn host_arm_variant() -> Option<&'static str> {
    if cfg!(target_feature = "v7") {
        Some("v7")
    } else if cfg!(target_feature = "v6") {
        Some("v6")
    } else {
        None
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rust_normalizes_arch() {
        assert_eq!(Platform::from_rust("linux", "x86_64", true).to_string(), "linux/amd64");
        assert_eq!(
            Platform::from_rust("linux", "aarch64", true).to_string(),
            "linux/arm64/v8"
        );
        assert_eq!(Platform::from_rust("macos", "x86_64", true).os, "darwin");
        assert_eq!(Platform::from_rust("linux", "riscv64", true).architecture, "riscv64");
    }

    #[test]
    fn test_from_rust_follows_endianness() {
        assert_eq!(Platform::from_rust("linux", "powerpc64", true).architecture, "ppc64le");
        assert_eq!(Platform::from_rust("linux", "powerpc64", false).architecture, "ppc64");
        assert_eq!(Platform::from_rust("linux", "mips64", true).architecture, "mips64le");
        assert_eq!(Platform::from_rust("linux", "mips64", false).architecture, "mips64");
        assert_eq!(Platform::from_rust("linux", "s390x", false).architecture, "s390x");
    }

    #[test]
    fn test_arm_variant_is_not_assumed() {
        assert_eq!(Platform::from_rust("linux", "arm", true).variant, None);
        let host = Platform::host_default();
        if host.architecture != "arm" {
            assert_eq!(host.variant.is_some(), host.architecture == "arm64");
        }
    }
}
