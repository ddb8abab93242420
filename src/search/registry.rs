use crate::search::source::{InventorySource, ItemSource};
use parking_lot::RwLock;
use std::any::TypeId;
use std::sync::Arc;

struct Entry {
    type_id: TypeId,
    source: Arc<dyn ItemSource>,
}

/// Registered item sources, in registration order. At most one source per concrete type.
pub struct SourceRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.register(InventorySource);
        registry
    }
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Adds `source` unless one of the same type is already registered.
    pub fn register<S: ItemSource + 'static>(&self, source: S) -> bool {
        let type_id = TypeId::of::<S>();
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.type_id == type_id) {
            log::debug!("Item source '{}' already registered", source.name());
            return false;
        }
        log::info!("Registered item source '{}'", source.name());
        entries.push(Entry {
            type_id,
            source: Arc::new(source),
        });
        true
    }

    pub fn unregister<S: ItemSource + 'static>(&self) -> bool {
        let type_id = TypeId::of::<S>();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.type_id != type_id);
        entries.len() != before
    }

    /// Snapshot of the current sources, so a search never holds the lock while calling out.
    pub fn sources(&self) -> Vec<Arc<dyn ItemSource>> {
        self.entries.read().iter().map(|e| e.source.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
