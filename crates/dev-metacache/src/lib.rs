//! The develop engine's metadata cache (spec §4.A).
//!
//! Shaped after the teacher's `core-state` in-memory buffer registry:
//! a guarded map behind one `RwLock`, refcounted handles, and an LRU
//! sweep triggered on insert rather than on a timer. The teacher's
//! registry never needed write-back (buffers are transient); this crate
//! adds the relational-store/sidecar synchronization spec §4.A requires
//! on both release and eviction.

mod cache;
mod entry;
mod sidecar;
mod store;

pub use cache::{MetaHandle, MetadataCache, SeedOutcome};
pub use dev_types::ImageRecord;
pub use entry::{LockMode, WriteReleaseMode};
pub use sidecar::{notes_path, FsSidecarStore, SidecarBlob, SidecarStore};
pub use store::{MemoryStore, MetadataStore};

#[cfg(test)]
mod tests {
    use super::*;
    use dev_types::ImageId;
    use std::sync::Arc;

    fn sample(id: i32, filename: &str) -> ImageRecord {
        let mut r = ImageRecord::new_unknown(ImageId(id));
        r.filename = filename.into();
        r.fullpath = format!("/rolls/{filename}");
        r
    }

    #[test]
    fn metadata_round_trip_through_get_and_release() {
        let store = Arc::new(MemoryStore::new());
        store.seed(sample(1, "a.raw"));
        let cache = MetadataCache::new(store.clone(), None, 16);

        let mut handle = cache.get(ImageId(1), LockMode::Write);
        handle.rating = dev_types::Rating::new(4);
        handle.release(WriteReleaseMode::Safe).unwrap();

        let reloaded = store.load(ImageId(1)).unwrap();
        assert_eq!(reloaded.rating, dev_types::Rating::new(4));

        let handle = cache.get(ImageId(1), LockMode::Read);
        assert_eq!(handle.filename, "a.raw");
    }

    #[test]
    fn negative_id_yields_zero_initialized_record() {
        let store = Arc::new(MemoryStore::new());
        let cache = MetadataCache::new(store, None, 16);
        let handle = cache.get(ImageId(-1), LockMode::Read);
        assert!(handle.filename.is_empty());
    }

    #[test]
    fn minimal_release_discards_pending_write() {
        let store = Arc::new(MemoryStore::new());
        store.seed(sample(2, "b.raw"));
        let cache = MetadataCache::new(store.clone(), None, 16);

        let mut handle = cache.get(ImageId(2), LockMode::Write);
        handle.rating = dev_types::Rating::new(5);
        handle.release(WriteReleaseMode::Minimal).unwrap();

        // the store never saw the mutation
        assert_eq!(store.load(ImageId(2)).unwrap().rating, dev_types::Rating::UNKNOWN);
    }

    #[test]
    fn lru_evicts_oldest_refcount_zero_entry_first() {
        let store = Arc::new(MemoryStore::new());
        for i in 1..=3 {
            store.seed(sample(i, &format!("img{i}.raw")));
        }
        let cache = MetadataCache::new(store.clone(), None, 2);

        cache.get(ImageId(1), LockMode::Read).release(WriteReleaseMode::Minimal).unwrap();
        cache.get(ImageId(2), LockMode::Read).release(WriteReleaseMode::Minimal).unwrap();
        assert_eq!(cache.len(), 2);

        // touching id 3 should push the cache over capacity and evict id 1
        // (oldest by access clock, refcount already back to zero).
        cache.get(ImageId(3), LockMode::Read).release(WriteReleaseMode::Minimal).unwrap();
        assert_eq!(cache.len(), 2);

        let fresh = cache.get_reload(ImageId(1), LockMode::Read);
        assert_eq!(fresh.filename, "img1.raw"); // reload still works post-eviction
    }

    #[test]
    fn held_entries_are_never_evicted() {
        let store = Arc::new(MemoryStore::new());
        for i in 1..=3 {
            store.seed(sample(i, &format!("img{i}.raw")));
        }
        let cache = MetadataCache::new(store, None, 2);

        let held = cache.get(ImageId(1), LockMode::Read);
        cache.get(ImageId(2), LockMode::Read).release(WriteReleaseMode::Minimal).unwrap();
        cache.get(ImageId(3), LockMode::Read).release(WriteReleaseMode::Minimal).unwrap();

        assert_eq!(held.filename, "img1.raw"); // still valid, never evicted while held
    }

    #[test]
    fn seed_reports_present_on_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let cache = MetadataCache::new(store, None, 16);
        assert_eq!(cache.seed(sample(1, "a.raw")), SeedOutcome::Inserted);
        assert_eq!(cache.seed(sample(1, "a.raw")), SeedOutcome::Present);
    }

    #[test]
    fn seed_rejects_invalid_record() {
        let store = Arc::new(MemoryStore::new());
        let cache = MetadataCache::new(store, None, 16);
        assert_eq!(cache.seed(ImageRecord::new_unknown(ImageId(1))), SeedOutcome::Failed);
    }

    #[test]
    fn remove_does_not_delete_store_row() {
        let store = Arc::new(MemoryStore::new());
        store.seed(sample(1, "a.raw"));
        let cache = MetadataCache::new(store.clone(), None, 16);
        cache.get(ImageId(1), LockMode::Read).release(WriteReleaseMode::Minimal).unwrap();
        cache.remove(ImageId(1));
        assert_eq!(cache.len(), 0);
        assert!(store.load(ImageId(1)).is_some());
    }

    #[test]
    fn set_export_timestamp_stamps_and_persists() {
        let store = Arc::new(MemoryStore::new());
        store.seed(sample(1, "a.raw"));
        let cache = MetadataCache::new(store.clone(), None, 16);
        cache.set_export_timestamp(ImageId(1), 1_700_000_000);
        assert_eq!(store.load(ImageId(1)).unwrap().timestamps.exported, Some(1_700_000_000));
    }
}
