//! The develop engine's pixel cache and raster mask channel (spec §4.B, §4.G).
//!
//! Grounded on the teacher's `core-render::partial_cache` (an `ahash`-keyed
//! cache of per-line hashes with an explicit `clear`/`reset` vocabulary) and
//! on `parking_lot`'s `Arc`-owning guards (as `dev-metacache` uses) for the
//! explicit-release handle shape spec §4.B's `ref`/`rdlock`/`wrlock` needs.

mod buffer;
mod cache;
mod entry;
mod mask;

pub use buffer::{ImageBuffer, MaskBuffer};
pub use cache::{PixelCache, PixelHandle};
pub use entry::LockMode;
pub use mask::RasterMaskChannel;

#[cfg(test)]
mod tests {
    use super::*;
    use dev_types::{PipelineType, PixelCacheKey};

    fn key(tag: u64, pipeline_type: PipelineType) -> PixelCacheKey {
        PixelCacheKey::new(dev_types::GlobalHash(tag), pipeline_type)
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let cache = PixelCache::new(1 << 20);
        let k = key(1, PipelineType::Full);
        cache.insert(k, ImageBuffer::new(8, 8, 4)).release();
        let handle = cache.lookup(k).unwrap();
        assert_eq!(handle.width, 8);
    }

    #[test]
    fn flush_removes_only_matching_pipeline_type() {
        let cache = PixelCache::new(1 << 20);
        cache.insert(key(1, PipelineType::Preview), ImageBuffer::new(4, 4, 4)).release();
        cache.insert(key(2, PipelineType::Full), ImageBuffer::new(4, 4, 4)).release();
        cache.flush(PipelineType::Preview);
        assert!(cache.lookup(key(1, PipelineType::Preview)).is_none());
        assert!(cache.lookup(key(2, PipelineType::Full)).is_some());
    }

    #[test]
    fn held_entries_survive_budget_eviction() {
        let cache = PixelCache::new(0); // anything inserted is instantly over budget
        let held = cache.insert(key(1, PipelineType::Full), ImageBuffer::new(16, 16, 4));
        cache.insert(key(2, PipelineType::Full), ImageBuffer::new(16, 16, 4)).release();
        // the first entry is still referenced via `held`, so eviction must skip it.
        assert_eq!(held.width, 16);
    }

    #[test]
    fn get_entry_from_data_resolves_reverse_lookup() {
        let cache = PixelCache::new(1 << 20);
        let k = key(1, PipelineType::Full);
        let ptr = {
            let handle = cache.insert(k, ImageBuffer::new(4, 4, 4));
            let ptr = handle.data_ptr();
            handle.release();
            ptr
        };
        let found = cache.get_entry_from_data(ptr).unwrap();
        assert_eq!(found.key(), k);
    }

    #[test]
    fn export_and_thumbnail_never_cache_intermediates() {
        assert!(!PixelCache::caches(PipelineType::Export));
        assert!(!PixelCache::caches(PipelineType::Thumbnail));
        assert!(PixelCache::caches(PipelineType::Preview));
        assert!(PixelCache::caches(PipelineType::Full));
    }
}
