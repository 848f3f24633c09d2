//! In-memory backend — spec.md §4.2: "one map per layer, used for tests
//! and transient layers... contents do not survive a restart."

use std::collections::HashMap;

use crate::{Backend, BackendError, Result, StoredEntry};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<(String, Option<String>), StoredEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend { entries: HashMap::new() }
    }
}

impl Backend for MemoryBackend {
    fn set(&mut self, group: &str, name: Option<&str>, entry: StoredEntry) -> Result<()> {
        self.entries.insert((group.to_string(), name.map(str::to_string)), entry);
        Ok(())
    }

    fn get(&self, group: &str, name: Option<&str>) -> Result<StoredEntry> {
        self.entries
            .get(&(group.to_string(), name.map(str::to_string)))
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    fn unset(&mut self, group: &str, name: Option<&str>) -> Result<()> {
        self.entries
            .remove(&(group.to_string(), name.map(str::to_string)))
            .map(|_| ())
            .ok_or(BackendError::NotFound)
    }

    fn list(&self) -> Result<Vec<(String, Option<String>)>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buxton_wire::Value;

    #[test]
    fn set_get_roundtrip() {
        let mut backend = MemoryBackend::new();
        backend
            .set("base", Some("count"), StoredEntry::new(Value::Int32(7), "admin"))
            .unwrap();
        let entry = backend.get("base", Some("count")).unwrap();
        assert_eq!(entry.value, Value::Int32(7));
        assert_eq!(entry.label, "admin");
    }

    #[test]
    fn get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.get("base", Some("x")), Err(BackendError::NotFound)));
    }

    #[test]
    fn unset_missing_is_not_found() {
        let mut backend = MemoryBackend::new();
        assert!(matches!(backend.unset("base", Some("x")), Err(BackendError::NotFound)));
    }

    #[test]
    fn unset_removes_entry() {
        let mut backend = MemoryBackend::new();
        backend
            .set("base", Some("count"), StoredEntry::new(Value::Int32(1), "admin"))
            .unwrap();
        backend.unset("base", Some("count")).unwrap();
        assert!(backend.get("base", Some("count")).is_err());
    }

    #[test]
    fn list_reports_all_keys() {
        let mut backend = MemoryBackend::new();
        backend
            .set("base", Some("a"), StoredEntry::new(Value::Bool(true), "admin"))
            .unwrap();
        backend
            .set("base", Some("b"), StoredEntry::new(Value::Bool(false), "admin"))
            .unwrap();
        let mut keys = backend.list().unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ("base".to_string(), Some("a".to_string())),
                ("base".to_string(), Some("b".to_string())),
            ]
        );
    }
}
