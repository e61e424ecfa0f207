//! Explicit plugin registry and init ordering.
//!
//! Registrations are usually collected at link time into
//! [`PLUGINS`](crate::plugin::PLUGINS) and copied here with
//! [`Registry::from_static`].  Tests build a registry by hand instead, so a
//! process can host several independent registries.

use tracing::warn;

use crate::error::{PluginError, PluginResult};
use crate::plugin::{PLUGINS, Registration};

/// An ordered collection of [`Registration`]s.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<Registration>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every registration linked into the binary.
    pub fn from_static() -> Self {
        let mut registry = Self::new();
        for registration in PLUGINS.iter() {
            registry.register(*registration);
        }
        registry
    }

    /// Adds a registration.
    ///
    /// A second registration with the same `(type, id)` replaces the first in
    /// place; the last registration wins.
    pub fn register(&mut self, registration: Registration) {
        if let Some(existing) = self.entries.iter_mut().find(|r| {
            r.plugin_type == registration.plugin_type && r.id == registration.id
        }) {
            warn!(
                plugin = %registration.uri(),
                "Duplicate plugin registration, last registration wins"
            );
            *existing = registration;
            return;
        }
        self.entries.push(registration);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, registration: Registration) -> Self {
        self.register(registration);
        self
    }

    /// Iterates registrations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the registrations in initialization order.
    ///
    /// Registrations with no ordering constraint between them keep their
    /// registration order.
    ///
    /// # Errors
    ///
    /// [`PluginError::DependencyCycle`] when `requires` edges form a cycle.
    pub fn ordered(&self) -> PluginResult<Vec<Registration>> {
        let layers = topological_layers(&self.entries)?;
        Ok(layers
            .into_iter()
            .flatten()
            .map(|i| self.entries[i])
            .collect())
    }
}

// =============================================================================
// Topological sort utility
// =============================================================================

/// Computes the init order as **layers** via Kahn's algorithm.
///
/// An edge **A → B** means "A must initialize before B", i.e. B requires A's
/// plugin type.  Each layer lists indices in ascending (registration) order.
fn topological_layers(entries: &[Registration]) -> PluginResult<Vec<Vec<usize>>> {
    let n = entries.len();

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, plugin) in entries.iter().enumerate() {
        for (j, other) in entries.iter().enumerate() {
            if i != j && plugin.depends_on(other) {
                dependents[j].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while !current.is_empty() {
        processed += current.len();
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        layers.push(current);
        current = next;
    }

    if processed != n {
        let cycle_nodes: Vec<String> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| entries[i].uri())
            .collect();
        return Err(PluginError::DependencyCycle(cycle_nodes.join(", ")));
    }

    Ok(layers)
}
