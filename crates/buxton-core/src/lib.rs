//! # buxton-core
//!
//! The daemon-side logic that sits between the wire protocol and storage:
//! the layer stack, the lazily-opened backend registry, the access-gated
//! resolver operations (spec.md §4.4), and per-key change notification
//! (spec.md §4.5). None of this crate touches a socket — `buxton-daemon`
//! owns the event loop and calls into [`Resolver`] once per decoded frame.

pub mod error;
pub mod layer;
pub mod notify;
pub mod registry;
pub mod resolver;

pub use error::{CoreError, Result};
pub use layer::{BackendSelector, Layer, LayerTable, Scope};
pub use notify::NotificationRegistry;
pub use registry::BackendRegistry;
pub use resolver::{Resolver, GROUP_SENTINEL};
