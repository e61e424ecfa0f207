//! Shutdown hooks.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;

/// Something the host stops when it shuts down.
///
/// A plugin hands its closer to the host through
/// [`InitContext::set_closer`](crate::context::InitContext::set_closer).
/// Closers run once, in reverse initialization order.
#[async_trait]
pub trait Closer: Send + Sync {
    /// Releases the plugin's resources.
    async fn close(&self) -> Result<(), BoxError>;
}

/// Optional closer attached to a plugin.
#[derive(Clone, Default)]
pub struct CloserSlot(Option<Arc<dyn Closer>>);

impl CloserSlot {
    /// Wraps a closer.
    pub fn new(closer: Arc<dyn Closer>) -> Self {
        Self(Some(closer))
    }

    /// The attached closer, if any.
    pub fn get(&self) -> Option<&Arc<dyn Closer>> {
        self.0.as_ref()
    }
}

impl fmt::Debug for CloserSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "Some(<closer>)" } else { "None" })
    }
}
