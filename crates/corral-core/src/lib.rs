//! # Corral Core
//!
//! Plugin host primitives shared by every Corral crate.
//!
//! This layer provides:
//! - [`Registration`]: static plugin descriptors collected with `linkme`
//! - [`Registry`] and [`PluginManager`]: dependency-ordered initialization
//! - [`InitContext`]: what a plugin sees while it initializes
//! - [`PluginSet`] and [`resolve`]: looking up and type-checking siblings
//! - [`Platform`]: OCI platform descriptors
//!
//! It has no knowledge of any particular plugin; the CRI plugin lives in
//! `corral-cri` and the host runtime in `corral-runtime`.

pub mod context;
pub mod error;
pub mod manager;
pub mod platform;
pub mod plugin;
pub mod registry;
pub mod resolve;
pub mod set;

pub use context::{InitContext, InitContextBuilder};
pub use error::{BoxError, PluginError, PluginResult, SkipPlugin};
pub use manager::{ManagerSettings, PluginManager};
pub use platform::Platform;
pub use plugin::{Closer, CloserSlot, InitFn, Instance, Meta, PLUGINS, PluginType, Registration};
pub use registry::Registry;
pub use resolve::{Resolution, ResolveError, resolve};
pub use set::{LoadedPlugin, PluginLookup, PluginSet, PluginStatus};

// Re-exported so plugin crates can register without depending on linkme.
pub use futures::future::BoxFuture;
pub use linkme;
