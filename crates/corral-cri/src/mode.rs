//! Selection between the two CRI service implementations.

use std::ffi::OsStr;
use std::fmt;

/// Environment variable that switches to the sandbox-mode service when set
/// to any non-empty value.
pub const ENABLE_CRI_SANDBOXES: &str = "ENABLE_CRI_SANDBOXES";

/// Which CRI service implementation a process runs.
///
/// Exactly one is constructed per process.  The choice is made once, before
/// initialization, and injected into [`Startup`](crate::startup::Startup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceMode {
    /// Experimental service built around sandbox controllers.
    Sandbox,
    /// The established service, optionally integrated with NRI.
    Legacy,
}

impl ServiceMode {
    /// Reads [`ENABLE_CRI_SANDBOXES`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_toggle(std::env::var_os(ENABLE_CRI_SANDBOXES).as_deref())
    }

    /// Mode for a given toggle value; any non-empty value selects
    /// [`ServiceMode::Sandbox`].
    pub fn from_toggle(value: Option<&OsStr>) -> Self {
        match value {
            Some(value) if !value.is_empty() => Self::Sandbox,
            _ => Self::Legacy,
        }
    }

    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
