//! Lazily-opened backend instances, keyed by layer (+ uid for user layers)
//! — spec.md §3 "Lifecycles": "Backends are opened lazily on first use of
//! a layer and closed at shutdown."

use std::collections::HashMap;
use std::path::PathBuf;

use buxton_backend::{Backend, BackendKey, MemoryBackend, PersistentBackend};

use crate::layer::{BackendSelector, Layer, Scope};

/// Owns every opened `Backend` instance for the daemon's lifetime. Plain
/// `HashMap`, no interior mutability of its own — the caller (`Resolver`)
/// holds `&mut` for the duration of one dispatch, matching spec.md §5:
/// "mutated only from the event loop thread; no synchronization
/// primitives are needed."
pub struct BackendRegistry {
    db_dir: PathBuf,
    backends: HashMap<BackendKey, Box<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        BackendRegistry { db_dir: db_dir.into(), backends: HashMap::new() }
    }

    fn key_for(layer: &Layer, uid: u32) -> BackendKey {
        match layer.scope {
            Scope::System => BackendKey::System(layer.name.clone()),
            Scope::User => BackendKey::User(layer.name.clone(), uid),
        }
    }

    /// Borrow the backend for `layer`, opening it first if this is the
    /// first use. `uid` is ignored for system-scoped layers.
    pub fn get(&mut self, layer: &Layer, uid: u32) -> buxton_backend::Result<&mut dyn Backend> {
        let key = Self::key_for(layer, uid);
        if !self.backends.contains_key(&key) {
            let backend: Box<dyn Backend> = match layer.backend {
                BackendSelector::Memory => Box::new(MemoryBackend::new()),
                BackendSelector::Persistent => {
                    let path = self.db_dir.join(key.db_filename());
                    Box::new(PersistentBackend::open(&path)?)
                }
            };
            self.backends.insert(key.clone(), backend);
        }
        Ok(self.backends.get_mut(&key).expect("just inserted").as_mut())
    }
}
