//! # buxton-backend
//!
//! The storage contract every layer is backed by (spec.md §4.2): a uniform
//! `Backend` trait plus the two implementations the spec requires, an
//! in-memory map for tests/transient layers and a persistent per-layer
//! SQLite file. Both share the same `group\0name` key composition and the
//! same `buxton_wire::Value` encoding, so a value round-trips through
//! either backend with no transformation (spec §4.2: "values round-trip
//! through the codec without transformation").

pub mod key;
pub mod memory;
pub mod persistent;

pub use key::{compose_key, BackendKey};
pub use memory::MemoryBackend;
pub use persistent::PersistentBackend;

use buxton_wire::Value;

/// Errors a backend can report. Per spec §4.2 ("failure is opaque to the
/// caller"), the resolver maps any of these to `StatusCode::Backend`
/// without forwarding the details to the wire; they are logged here via
/// `tracing` instead.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("key not found")]
    NotFound,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open backend file {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored value failed to decode: {0}")]
    Corrupt(#[from] buxton_wire::WireError),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// A stored (value, label) pair — spec.md §3 "Stored entry". The label is
/// persisted alongside the value and checked by the access gate on every
/// future read/write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: Value,
    pub label: String,
}

impl StoredEntry {
    pub fn new(value: Value, label: impl Into<String>) -> Self {
        StoredEntry { value, label: label.into() }
    }
}

/// Uniform contract a layer's storage is backed by — spec.md §4.2. One
/// instance always corresponds to exactly one layer (the layer/uid
/// selection that picks *which* instance to use lives in `buxton-core`'s
/// backend registry, keyed by [`BackendKey`]).
pub trait Backend {
    fn set(&mut self, group: &str, name: Option<&str>, entry: StoredEntry) -> Result<()>;
    fn get(&self, group: &str, name: Option<&str>) -> Result<StoredEntry>;
    fn unset(&mut self, group: &str, name: Option<&str>) -> Result<()>;
    /// Enumerate all keys in iteration order of the backend — spec §4.6:
    /// "the key names in iteration order of the backend".
    fn list(&self) -> Result<Vec<(String, Option<String>)>>;
}
