//! Client-side error type — spec.md §4.8/§7.

use buxton_wire::{StatusCode, WireError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire codec error: {0}")]
    Wire(#[from] WireError),

    /// A non-`Ok` `StatusCode` the daemon actually returned — spec §7's
    /// taxonomy surfaced to the caller as `Err`, not decoded further.
    #[error("request failed: {0:?}")]
    Status(StatusCode),

    #[error("connection closed before a reply arrived")]
    Closed,

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
