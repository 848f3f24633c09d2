//! # buxton-client
//!
//! The client library for `buxtond` (spec.md §4.8): an async,
//! callback-driven core ([`Client`]) plus a thin synchronous
//! [`convenience`] layer built on top of it. Connects over the same
//! `buxton-wire` frame codec the daemon speaks — nothing here is
//! daemon-internal.

pub mod client;
pub mod convenience;
pub mod error;
pub mod response;

pub use client::Client;
pub use error::{ClientError, Result};
pub use response::Response;
