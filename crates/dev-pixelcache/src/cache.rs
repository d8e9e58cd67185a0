//! [`PixelCache`]: a content-addressed, byte-budgeted cache of processed
//! image buffers (spec §4.B).

use crate::buffer::ImageBuffer;
use crate::entry::{CacheEntry, LockMode};
use dev_types::{PipelineType, PixelCacheKey};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

enum PixelGuard {
    Read(ArcRwLockReadGuard<RawRwLock, ImageBuffer>),
    Write(ArcRwLockWriteGuard<RawRwLock, ImageBuffer>),
}

/// A borrowed view of a resident buffer. The refcount is incremented on
/// acquisition and decremented on `release`/`Drop`, per spec §4.B's
/// `ref(entry, +1|-1)` operation expressed as RAII plus an explicit escape
/// hatch for callers (the executor) that must hold a buffer across several
/// pipeline stages without nesting borrows.
pub struct PixelHandle {
    entry: Arc<CacheEntry>,
    guard: Option<PixelGuard>,
    released: bool,
}

impl std::ops::Deref for PixelHandle {
    type Target = ImageBuffer;

    fn deref(&self) -> &ImageBuffer {
        match self.guard.as_ref().expect("handle already released") {
            PixelGuard::Read(g) => g,
            PixelGuard::Write(g) => g,
        }
    }
}

impl std::ops::DerefMut for PixelHandle {
    fn deref_mut(&mut self) -> &mut ImageBuffer {
        match self.guard.as_mut().expect("handle already released") {
            PixelGuard::Read(_) => panic!("cannot mutate a read-acquired pixel handle"),
            PixelGuard::Write(g) => g,
        }
    }
}

impl PixelHandle {
    pub fn key(&self) -> PixelCacheKey {
        self.entry.key
    }

    /// Raw identity of the underlying buffer, usable as the `ptr` argument
    /// to [`PixelCache::get_entry_from_data`].
    pub fn data_ptr(&self) -> usize {
        Arc::as_ptr(&self.entry.buffer) as usize
    }

    /// Release the lock and decrement the refcount (spec §4.B `ref(entry,-1)`).
    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            self.guard = None;
            self.entry.refcount.fetch_sub(1, Ordering::AcqRel);
            self.released = true;
        }
    }
}

impl Drop for PixelHandle {
    fn drop(&mut self) {
        self.do_release();
    }
}

struct CacheInner {
    entries: RwLock<HashMap<PixelCacheKey, Arc<CacheEntry>>>,
    capacity_bytes: u64,
    used_bytes: AtomicU64,
    clock: AtomicU64,
}

/// The develop engine's pixel cache (spec §4.B). Cheap to clone.
#[derive(Clone)]
pub struct PixelCache {
    inner: Arc<CacheInner>,
}

impl PixelCache {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                capacity_bytes,
                used_bytes: AtomicU64::new(0),
                clock: AtomicU64::new(0),
            }),
        }
    }

    fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether buffers belonging to `pipeline_type` participate in caching
    /// at all (spec §4.B "Sizing": EXPORT/THUMBNAIL never cache intermediates).
    pub fn caches(pipeline_type: PipelineType) -> bool {
        pipeline_type.caches_intermediates()
    }

    fn touch_and_lock(&self, entry: &Arc<CacheEntry>, mode: LockMode) -> PixelHandle {
        entry.refcount.fetch_add(1, Ordering::AcqRel);
        entry.last_access.store(self.tick(), Ordering::Release);
        let guard = match mode {
            LockMode::Read => PixelGuard::Read(entry.buffer.read_arc()),
            LockMode::Write => PixelGuard::Write(entry.buffer.write_arc()),
        };
        PixelHandle {
            entry: entry.clone(),
            guard: Some(guard),
            released: false,
        }
    }

    /// `lookup(key)`: returns a read-locked handle if present.
    pub fn lookup(&self, key: PixelCacheKey) -> Option<PixelHandle> {
        let entry = self.inner.entries.read().get(&key).cloned()?;
        Some(self.touch_and_lock(&entry, LockMode::Read))
    }

    /// `insert(key, buffer)`: stores a freshly computed buffer and returns a
    /// write-locked handle to it (the common case: the caller just produced
    /// the data and wants to finish populating/inspecting it).
    pub fn insert(&self, key: PixelCacheKey, buffer: ImageBuffer) -> PixelHandle {
        let clock = self.tick();
        let entry = CacheEntry::new(key, buffer, clock);
        self.inner.used_bytes.fetch_add(entry.byte_size, Ordering::AcqRel);
        self.inner.entries.write().insert(key, entry.clone());
        // Lock before sweeping for eviction candidates: a fresh entry starts
        // at refcount 0 and would otherwise be eligible to evict itself.
        let handle = self.touch_and_lock(&entry, LockMode::Write);
        self.evict_if_over_budget();
        handle
    }

    /// `rdlock`/`wrlock` on an already-known entry without a map lookup,
    /// used by the executor once it holds a `PixelCacheKey` from the piece
    /// it's resolving.
    pub fn lock(&self, key: PixelCacheKey, mode: LockMode) -> Option<PixelHandle> {
        let entry = self.inner.entries.read().get(&key).cloned()?;
        Some(self.touch_and_lock(&entry, mode))
    }

    /// Reverse lookup from a buffer pointer an executor is already holding.
    /// Takes a read lock on the matched entry before returning, which the
    /// caller must release (spec §4.B).
    pub fn get_entry_from_data(&self, ptr: usize) -> Option<PixelHandle> {
        let entries = self.inner.entries.read();
        let entry = entries
            .values()
            .find(|e| Arc::as_ptr(&e.buffer) as usize == ptr)
            .cloned()?;
        drop(entries);
        Some(self.touch_and_lock(&entry, LockMode::Read))
    }

    /// Removes one entry outright, regardless of refcount. Callers are
    /// expected to only call this for entries they know are unreferenced
    /// (e.g. after an operator failure poisons its output, spec §4.E).
    pub fn remove(&self, key: PixelCacheKey) {
        if let Some(entry) = self.inner.entries.write().remove(&key) {
            self.inner.used_bytes.fetch_sub(entry.byte_size, Ordering::AcqRel);
            trace!(target: "pixelcache", ?key, "removed");
        }
    }

    /// `flush(pipelineType)`: removes all entries tagged with the given
    /// pipeline type, regardless of refcount (a flush is an explicit
    /// invalidation, e.g. on full-rebuild or `reset_all`).
    pub fn flush(&self, pipeline_type: PipelineType) {
        let mut entries = self.inner.entries.write();
        let doomed: Vec<PixelCacheKey> = entries
            .iter()
            .filter(|(k, _)| k.pipeline_type == pipeline_type)
            .map(|(k, _)| *k)
            .collect();
        for key in doomed {
            if let Some(entry) = entries.remove(&key) {
                self.inner.used_bytes.fetch_sub(entry.byte_size, Ordering::AcqRel);
            }
        }
        trace!(target: "pixelcache", ?pipeline_type, "flushed");
    }

    fn evict_if_over_budget(&self) {
        if self.inner.used_bytes.load(Ordering::Acquire) <= self.inner.capacity_bytes {
            return;
        }
        let mut entries = self.inner.entries.write();
        let mut candidates: Vec<(PixelCacheKey, u64, u64)> = entries
            .iter()
            .filter(|(_, e)| e.refcount.load(Ordering::Acquire) == 0)
            .map(|(k, e)| (*k, e.last_access.load(Ordering::Acquire), e.byte_size))
            .collect();
        candidates.sort_by_key(|(_, clock, _)| *clock);

        for (key, _, byte_size) in candidates {
            if self.inner.used_bytes.load(Ordering::Acquire) <= self.inner.capacity_bytes {
                break;
            }
            entries.remove(&key);
            self.inner.used_bytes.fetch_sub(byte_size, Ordering::AcqRel);
            trace!(target: "pixelcache", ?key, "evicted_over_budget");
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.used_bytes.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
