//! Plugin model of the Corral host.
//!
//! # Architecture
//!
//! A plugin is described by a [`Registration`]: a static, `Copy` record of
//! its type, id, the plugin types it requires and a function pointer that
//! initializes it.  Registrations are declared once at load time, usually as
//! entries of the [`PLUGINS`] distributed slice:
//!
//! ```rust,ignore
//! use corral_core::plugin::{PLUGINS, PluginType, Registration};
//!
//! #[corral_core::linkme::distributed_slice(PLUGINS)]
//! #[linkme(crate = corral_core::linkme)]
//! static EXCHANGE: Registration = Registration::new(PluginType::EVENT, "exchange", init_exchange)
//!     .requires(&[]);
//! ```
//!
//! The host copies them into an explicit [`Registry`](crate::registry::Registry),
//! orders them by their `requires` edges and calls each init function with an
//! [`InitContext`](crate::context::InitContext).  What an init function returns
//! is an [`Instance`]: a type-erased handle that sibling plugins look up by
//! `(type, id)` and downcast back to the trait object they expect.

pub mod closer;
pub mod instance;
pub mod meta;
pub mod registration;
pub mod types;

pub use closer::{Closer, CloserSlot};
pub use instance::Instance;
pub use meta::Meta;
pub use registration::{InitFn, PLUGINS, Registration};
pub use types::PluginType;
