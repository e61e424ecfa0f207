//! Plugin type identifiers.

use std::fmt;

/// Namespaced identifier of a plugin capability type.
///
/// Plugins declare the type they provide and the types they require before
/// they may initialize.  The [`ALL`](PluginType::ALL) wildcard in a
/// `requires` list means "every other registered plugin".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginType(&'static str);

impl PluginType {
    /// Wildcard requirement matching every other plugin.
    pub const ALL: Self = Self("*");
    /// Event distribution (the event exchange).
    pub const EVENT: Self = Self("io.corral.event.v1");
    /// In-process services wrapped by the runtime client.
    pub const SERVICE: Self = Self("io.corral.service.v1");
    /// Plugins exposing an API over gRPC.
    pub const GRPC: Self = Self("io.corral.grpc.v1");
    /// Node Resource Interface integration.
    pub const NRI_API: Self = Self("io.corral.nri.v1");
    /// Plugins used only by other plugins.
    pub const INTERNAL: Self = Self("io.corral.internal.v1");

    /// Creates a custom plugin type.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the type string.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Returns `true` for the `*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::ALL.0
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
