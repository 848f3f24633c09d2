//! Named layers and the priority-ordered stack — spec.md §3, §4.4.

/// A layer's store scope: one shared system store, or one per-uid store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    System,
    User,
}

/// Which `buxton_backend::Backend` implementation a layer is backed by.
/// Names preserved from the original backend enum (`gdbm` -> persistent,
/// `memory` -> in-memory) per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelector {
    Persistent,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub scope: Scope,
    pub backend: BackendSelector,
    pub priority: i32,
    pub description: String,
    /// Tie-breaker for equal priorities — spec.md §3 invariant 6: "ties are
    /// broken by insertion order at configuration load."
    pub insertion_order: u32,
}

/// The layer stack, always kept sorted `(priority desc, insertion_order
/// asc)` — the total order spec.md §3 invariant 6 requires.
#[derive(Debug, Default)]
pub struct LayerTable {
    layers: Vec<Layer>,
}

impl LayerTable {
    pub fn new() -> Self {
        LayerTable { layers: Vec::new() }
    }

    /// Insert a layer, assigning it the next insertion order, then
    /// re-sort. Layers are created once at daemon start (spec.md §3
    /// "Lifecycles"), so this is only ever called during configuration
    /// loading.
    pub fn insert(&mut self, name: impl Into<String>, scope: Scope, backend: BackendSelector, priority: i32, description: impl Into<String>) {
        let insertion_order = self.layers.len() as u32;
        self.layers.push(Layer {
            name: name.into(),
            scope,
            backend,
            priority,
            description: description.into(),
            insertion_order,
        });
        self.layers.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then(a.insertion_order.cmp(&b.insertion_order))
        });
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// All layers, highest priority first, ties broken by insertion order.
    pub fn iter_by_priority(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_priority_descending() {
        let mut table = LayerTable::new();
        table.insert("base", Scope::System, BackendSelector::Memory, 0, "");
        table.insert("override", Scope::System, BackendSelector::Memory, 10, "");
        let names: Vec<&str> = table.iter_by_priority().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["override", "base"]);
    }

    #[test]
    fn ties_broken_by_insertion_order() {
        let mut table = LayerTable::new();
        table.insert("first", Scope::System, BackendSelector::Memory, 5, "");
        table.insert("second", Scope::System, BackendSelector::Memory, 5, "");
        let names: Vec<&str> = table.iter_by_priority().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
