//! The layer resolver — spec.md §4.4. The in-process entry point used by
//! both the wire dispatcher and a privileged direct caller (the CLI's
//! `--direct` mode); the only difference between the two is whether
//! `privileged` is set, which skips the access gate entirely.

use tracing::warn;

use buxton_backend::StoredEntry;
use buxton_policy::{Access, PolicyEngine};
use buxton_wire::{Key, TypeTag, Value};

use crate::error::{CoreError, Result};
use crate::layer::LayerTable;
use crate::registry::BackendRegistry;

/// Placeholder value stored for a group entry — never returned to a
/// client (spec.md §4.4: "a group's stored value is the fixed sentinel
/// placeholder").
pub const GROUP_SENTINEL: Value = Value::Bool(true);

fn find_layer<'a>(layers: &'a LayerTable, name: &str) -> Result<&'a crate::layer::Layer> {
    layers.get(name).ok_or_else(|| CoreError::Invalid(format!("unknown layer '{name}'")))
}

fn backend_error(err: buxton_backend::BackendError) -> CoreError {
    match err {
        buxton_backend::BackendError::NotFound => CoreError::NotFound,
        other => {
            warn!(%other, "backend operation failed");
            CoreError::Backend(other)
        }
    }
}

pub struct Resolver;

impl Resolver {
    /// spec.md §4.4: "places the value in exactly the named layer,
    /// subject to the access gate unless the caller is privileged."
    #[allow(clippy::too_many_arguments)]
    pub fn set_value(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        policy: &PolicyEngine,
        layer_name: &str,
        key: &Key,
        value: Value,
        caller_label: &str,
        uid: u32,
        privileged: bool,
    ) -> Result<()> {
        let layer = find_layer(layers, layer_name)?;
        let name = key.name.as_deref().ok_or_else(|| {
            CoreError::Invalid("SET requires a key name within a group".to_string())
        })?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;

        let group_entry = backend
            .get(&key.group, None)
            .map_err(|_| CoreError::Invalid(format!("group '{}' does not exist", key.group)))?;
        let existing = backend.get(&key.group, Some(name)).ok();

        let gate_label = existing.as_ref().map(|e| e.label.as_str()).unwrap_or(group_entry.label.as_str());
        if !privileged && !policy.check(caller_label, gate_label, Access::Write) {
            return Err(CoreError::Denied);
        }

        let label = existing.map(|e| e.label).unwrap_or(group_entry.label);
        backend.set(&key.group, Some(name), StoredEntry::new(value, label)).map_err(backend_error)?;
        Ok(())
    }

    /// spec.md §4.4: searches all layers (or just `key.layer` if set),
    /// highest priority first; unreadable entries are transparently
    /// skipped, as if absent.
    pub fn get_value(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        policy: &PolicyEngine,
        key: &Key,
        caller_label: &str,
        uid: u32,
        expected_type: Option<TypeTag>,
    ) -> Result<(String, Value)> {
        let name = key.name.as_deref().ok_or_else(|| {
            CoreError::Invalid("GET requires a key name within a group".to_string())
        })?;
        for layer in layers.iter_by_priority() {
            if let Some(want) = &key.layer {
                if layer.name != *want {
                    continue;
                }
            }
            let backend = registry.get(layer, uid).map_err(backend_error)?;
            let entry = match backend.get(&key.group, Some(name)) {
                Ok(entry) => entry,
                Err(buxton_backend::BackendError::NotFound) => continue,
                Err(other) => return Err(backend_error(other)),
            };
            if !policy.check(caller_label, &entry.label, Access::Read) {
                // Spec §4.3/§8: denied reads look identical to absence, to
                // avoid leaking existence via notification frequency or
                // probing.
                continue;
            }
            if let Some(want) = expected_type {
                if entry.value.type_tag() != want {
                    return Err(CoreError::TypeMismatch);
                }
            }
            return Ok((layer.name.clone(), entry.value));
        }
        Err(CoreError::NotFound)
    }

    /// Same as `get_value` but restricted to one named layer.
    pub fn get_value_for_layer(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        policy: &PolicyEngine,
        layer_name: &str,
        key: &Key,
        caller_label: &str,
        uid: u32,
        expected_type: Option<TypeTag>,
    ) -> Result<Value> {
        let layer = find_layer(layers, layer_name)?;
        let name = key.name.as_deref().ok_or_else(|| {
            CoreError::Invalid("GET requires a key name within a group".to_string())
        })?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;
        let entry = backend.get(&key.group, Some(name)).map_err(backend_error)?;
        if !policy.check(caller_label, &entry.label, Access::Read) {
            return Err(CoreError::NotFound);
        }
        if let Some(want) = expected_type {
            if entry.value.type_tag() != want {
                return Err(CoreError::TypeMismatch);
            }
        }
        Ok(entry.value)
    }

    /// Privileged only: replaces the stored label without touching the
    /// value. If `key` names a bare group, the value is the fixed
    /// sentinel placeholder (spec.md §4.4).
    pub fn set_label(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        layer_name: &str,
        key: &Key,
        new_label: &str,
        uid: u32,
    ) -> Result<()> {
        let layer = find_layer(layers, layer_name)?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;
        match &key.name {
            None => {
                let existing = backend.get(&key.group, None).map_err(backend_error)?;
                backend
                    .set(&key.group, None, StoredEntry::new(existing.value, new_label))
                    .map_err(backend_error)?;
            }
            Some(name) => {
                let existing = backend.get(&key.group, Some(name)).map_err(backend_error)?;
                backend
                    .set(&key.group, Some(name), StoredEntry::new(existing.value, new_label))
                    .map_err(backend_error)?;
            }
        }
        Ok(())
    }

    /// Enumerates the layer's backend, spec.md §4.4/§4.6, in the
    /// backend's own iteration order, as fully-qualified key text.
    pub fn list_keys(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        layer_name: &str,
        uid: u32,
    ) -> Result<Vec<String>> {
        let layer = find_layer(layers, layer_name)?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;
        let keys = backend.list().map_err(backend_error)?;
        Ok(keys
            .into_iter()
            .map(|(group, name)| match name {
                Some(name) => format!("{group}.{name}"),
                None => group,
            })
            .collect())
    }

    pub fn unset_value(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        policy: &PolicyEngine,
        layer_name: &str,
        key: &Key,
        caller_label: &str,
        uid: u32,
        privileged: bool,
    ) -> Result<()> {
        let layer = find_layer(layers, layer_name)?;
        let name = key.name.as_deref().ok_or_else(|| {
            CoreError::Invalid("UNSET requires a key name within a group".to_string())
        })?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;
        let existing = backend.get(&key.group, Some(name)).map_err(backend_error)?;
        if !privileged && !policy.check(caller_label, &existing.label, Access::Write) {
            return Err(CoreError::Denied);
        }
        backend.unset(&key.group, Some(name)).map_err(backend_error)?;
        Ok(())
    }

    /// Idempotent: an existing group returns `Ok` with no side effects
    /// (spec.md §8). A freshly created group's label is the caller's own
    /// label, which then gates creation of keys within it until an
    /// explicit `SET_LABEL`.
    pub fn create_group(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        layer_name: &str,
        group: &str,
        caller_label: &str,
        uid: u32,
    ) -> Result<()> {
        let layer = find_layer(layers, layer_name)?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;
        if backend.get(group, None).is_ok() {
            return Ok(());
        }
        backend
            .set(group, None, StoredEntry::new(GROUP_SENTINEL, caller_label))
            .map_err(backend_error)?;
        Ok(())
    }

    /// Cascades to every key under `group` in this layer — spec.md §3:
    /// "group removal cascades to all keys in that group in that layer."
    pub fn remove_group(
        layers: &LayerTable,
        registry: &mut BackendRegistry,
        policy: &PolicyEngine,
        layer_name: &str,
        group: &str,
        caller_label: &str,
        uid: u32,
        privileged: bool,
    ) -> Result<()> {
        let layer = find_layer(layers, layer_name)?;
        let backend = registry.get(layer, uid).map_err(backend_error)?;
        let group_entry = backend.get(group, None).map_err(backend_error)?;
        if !privileged && !policy.check(caller_label, &group_entry.label, Access::Write) {
            return Err(CoreError::Denied);
        }
        let members: Vec<Option<String>> = backend
            .list()
            .map_err(backend_error)?
            .into_iter()
            .filter(|(g, _)| g == group)
            .map(|(_, name)| name)
            .collect();
        for name in members {
            backend.unset(group, name.as_deref()).map_err(backend_error)?;
        }
        backend.unset(group, None).map_err(backend_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{BackendSelector, Scope};
    use buxton_policy::PolicyEngine;

    fn fixture() -> (LayerTable, BackendRegistry, PolicyEngine) {
        let mut layers = LayerTable::new();
        layers.insert("base", Scope::System, BackendSelector::Memory, 0, "");
        layers.insert("override", Scope::System, BackendSelector::Memory, 10, "");
        let registry = BackendRegistry::new(std::env::temp_dir());
        let policy = PolicyEngine::load("/nonexistent-buxton-mount/rules.load2");
        (layers, registry, policy)
    }

    #[test]
    fn round_trip_through_layer() {
        let (layers, mut registry, policy) = fixture();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        let key = Key::new("demo").unwrap().with_name("count");
        Resolver::set_value(&layers, &mut registry, &policy, "base", &key, Value::Int32(7), "admin", 0, false).unwrap();
        let (layer_name, value) =
            Resolver::get_value(&layers, &mut registry, &policy, &key, "admin", 0, None).unwrap();
        assert_eq!(layer_name, "base");
        assert_eq!(value, Value::Int32(7));
    }

    #[test]
    fn set_without_group_is_invalid() {
        let (layers, mut registry, policy) = fixture();
        let key = Key::new("demo").unwrap().with_name("count");
        let err = Resolver::set_value(&layers, &mut registry, &policy, "base", &key, Value::Int32(7), "admin", 0, false)
            .unwrap_err();
        assert!(matches!(err, CoreError::Invalid(_)));
    }

    #[test]
    fn layer_priority_resolution() {
        let (layers, mut registry, policy) = fixture();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        Resolver::create_group(&layers, &mut registry, "override", "demo", "admin", 0).unwrap();
        let key = Key::new("demo").unwrap().with_name("x");
        Resolver::set_value(&layers, &mut registry, &policy, "base", &key, Value::Bool(false), "admin", 0, false).unwrap();
        Resolver::set_value(&layers, &mut registry, &policy, "override", &key, Value::Bool(true), "admin", 0, false).unwrap();
        let (_, value) = Resolver::get_value(&layers, &mut registry, &policy, &key, "admin", 0, None).unwrap();
        assert_eq!(value, Value::Bool(true));

        Resolver::unset_value(&layers, &mut registry, &policy, "override", &key, "admin", 0, false).unwrap();
        let (_, value) = Resolver::get_value(&layers, &mut registry, &policy, &key, "admin", 0, None).unwrap();
        assert_eq!(value, Value::Bool(false));
    }

    #[test]
    fn group_removal_cascades() {
        let (layers, mut registry, policy) = fixture();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        let k1 = Key::new("demo").unwrap().with_name("a");
        let k2 = Key::new("demo").unwrap().with_name("b");
        Resolver::set_value(&layers, &mut registry, &policy, "base", &k1, Value::Int32(1), "admin", 0, false).unwrap();
        Resolver::set_value(&layers, &mut registry, &policy, "base", &k2, Value::Int32(2), "admin", 0, false).unwrap();
        Resolver::remove_group(&layers, &mut registry, &policy, "base", "demo", "admin", 0, false).unwrap();
        assert!(matches!(
            Resolver::get_value_for_layer(&layers, &mut registry, &policy, "base", &k1, "admin", 0, None),
            Err(CoreError::NotFound)
        ));
        assert!(matches!(
            Resolver::get_value_for_layer(&layers, &mut registry, &policy, "base", &k2, "admin", 0, None),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn create_group_is_idempotent() {
        let (layers, mut registry, _policy) = fixture();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "someone-else", 0).unwrap();
        let layer = layers.get("base").unwrap();
        let entry = registry.get(layer, 0).unwrap().get("demo", None).unwrap();
        // Second call was a no-op: label still belongs to the first creator.
        assert_eq!(entry.label, "admin");
    }

    #[test]
    fn unset_missing_key_is_not_found() {
        let (layers, mut registry, policy) = fixture();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        let key = Key::new("demo").unwrap().with_name("ghost");
        assert!(matches!(
            Resolver::unset_value(&layers, &mut registry, &policy, "base", &key, "admin", 0, false),
            Err(CoreError::NotFound)
        ));
    }

    #[test]
    fn type_mismatch_reported() {
        let (layers, mut registry, policy) = fixture();
        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        let key = Key::new("demo").unwrap().with_name("s");
        Resolver::set_value(&layers, &mut registry, &policy, "base", &key, Value::Str("alpha".into()), "admin", 0, false).unwrap();
        let err = Resolver::get_value(&layers, &mut registry, &policy, &key, "admin", 0, Some(TypeTag::Int32))
            .unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch));
    }

    #[test]
    fn read_denied_reports_not_found_not_denied() {
        let (layers, mut registry, _unused) = fixture();
        // A real policy engine with a rules table that denies "guest" read
        // access to anything labeled "admin".
        let dir = std::env::temp_dir().join(format!("buxton-resolver-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let rules_path = dir.join("rules.load2");
        std::fs::write(&rules_path, "").unwrap();
        let policy = PolicyEngine::load(rules_path);

        Resolver::create_group(&layers, &mut registry, "base", "demo", "admin", 0).unwrap();
        let key = Key::new("demo").unwrap().with_name("secret");
        Resolver::set_value(&layers, &mut registry, &policy, "base", &key, Value::Int32(1), "admin", 0, true).unwrap();

        let err = Resolver::get_value(&layers, &mut registry, &policy, &key, "guest", 0, None).unwrap_err();
        assert!(matches!(err, CoreError::NotFound));

        let err = Resolver::unset_value(&layers, &mut registry, &policy, "base", &key, "guest", 0, false).unwrap_err();
        assert!(matches!(err, CoreError::Denied));
    }
}
