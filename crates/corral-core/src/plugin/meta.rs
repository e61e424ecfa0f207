//! Metadata a plugin publishes about itself during init.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::platform::Platform;

/// Information exported by a plugin alongside its [`Instance`](super::Instance).
///
/// Filled in through [`InitContext`](crate::context::InitContext) while the
/// plugin initializes and kept in the plugin set afterwards, for example
/// to announce supported protocol versions or the target platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Meta {
    /// Platforms the plugin supports.
    pub platforms: Vec<Platform>,
    /// Free-form key/value exports (e.g. API versions).
    pub exports: BTreeMap<String, String>,
    /// Optional capability flags.
    pub capabilities: Vec<String>,
}
