//! The relational-store collaborator contract (spec §6). The schema itself
//! is out of scope (spec §1); this crate only needs the seam.

use dev_types::{DevelopError, ImageId, ImageRecord};
use std::collections::HashMap;
use std::sync::Mutex;

/// The "relational store" contract from spec §6: load/save/delete by id.
pub trait MetadataStore: Send + Sync {
    fn load(&self, id: ImageId) -> Option<ImageRecord>;
    fn save(&self, record: &ImageRecord) -> Result<(), DevelopError>;
    fn delete(&self, id: ImageId);
}

/// An in-memory test double standing in for the relational store. Good
/// enough to exercise `get`/`release`/eviction write-back without a real
/// database, which spec §1 explicitly places out of scope.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<ImageId, ImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: ImageRecord) {
        self.rows.lock().expect("memory store poisoned").insert(record.id(), record);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().expect("memory store poisoned").len()
    }
}

impl MetadataStore for MemoryStore {
    fn load(&self, id: ImageId) -> Option<ImageRecord> {
        self.rows.lock().expect("memory store poisoned").get(&id).cloned()
    }

    fn save(&self, record: &ImageRecord) -> Result<(), DevelopError> {
        self.rows
            .lock()
            .expect("memory store poisoned")
            .insert(record.id(), record.clone());
        Ok(())
    }

    fn delete(&self, id: ImageId) {
        self.rows.lock().expect("memory store poisoned").remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_row_round_trips() {
        let store = MemoryStore::new();
        let rec = ImageRecord::new_unknown(ImageId(5));
        store.seed(rec.clone());
        assert_eq!(store.load(ImageId(5)), Some(rec));
    }

    #[test]
    fn delete_removes_row() {
        let store = MemoryStore::new();
        store.seed(ImageRecord::new_unknown(ImageId(9)));
        store.delete(ImageId(9));
        assert_eq!(store.load(ImageId(9)), None);
    }
}
