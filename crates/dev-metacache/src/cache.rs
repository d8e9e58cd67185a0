//! [`MetadataCache`] and its handle type (spec §4.A).

use crate::entry::{Entry, EntryMeta, LockMode, WriteReleaseMode};
use crate::sidecar::SidecarStore;
use crate::store::MetadataStore;
use dev_types::{DevelopError, DevelopResult, ImageId, ImageRecord};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Whether [`MetadataCache::seed`] inserted a fresh entry or found one
/// already present, or failed outright (spec §4.A `seed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted,
    Present,
    Failed,
}

enum HandleGuard {
    Read(ArcRwLockReadGuard<RawRwLock, ImageRecord>),
    Write(ArcRwLockWriteGuard<RawRwLock, ImageRecord>),
}

/// A borrowed, reference-counted view of one cache entry. Unlike a plain
/// RAII guard, callers choose the write-back policy at release time, so
/// `release` is a consuming method rather than relying solely on `Drop`.
pub struct MetaHandle {
    id: ImageId,
    guard: HandleGuard,
    meta: Arc<EntryMeta>,
    cache: Arc<CacheInner>,
    released: bool,
}

impl std::ops::Deref for MetaHandle {
    type Target = ImageRecord;

    fn deref(&self) -> &ImageRecord {
        match &self.guard {
            HandleGuard::Read(g) => g,
            HandleGuard::Write(g) => g,
        }
    }
}

impl std::ops::DerefMut for MetaHandle {
    fn deref_mut(&mut self) -> &mut ImageRecord {
        match &mut self.guard {
            HandleGuard::Read(_) => panic!("cannot mutate a read-acquired metadata handle"),
            HandleGuard::Write(g) => g,
        }
    }
}

impl MetaHandle {
    fn is_write(&self) -> bool {
        matches!(self.guard, HandleGuard::Write(_))
    }

    /// Release the handle, applying `mode`'s write-back policy if this
    /// handle was write-acquired. Read-acquired handles ignore `mode`.
    pub fn release(mut self, mode: WriteReleaseMode) -> DevelopResult<()> {
        self.released = true;
        let is_write = self.is_write();
        let record = if is_write {
            match &self.guard {
                HandleGuard::Write(g) => Some((**g).clone()),
                HandleGuard::Read(_) => None,
            }
        } else {
            None
        };
        self.meta.refcount.fetch_sub(1, Ordering::AcqRel);

        if let Some(record) = record {
            match mode {
                WriteReleaseMode::Minimal => {
                    self.meta.dirty.store(true, Ordering::Release);
                    trace!(target: "metacache", id = ?self.id, "released_minimal_left_dirty");
                    Ok(())
                }
                WriteReleaseMode::Relaxed => {
                    let result = self.cache.write_back(&record, false);
                    if result.is_ok() {
                        self.meta.dirty.store(false, Ordering::Release);
                    }
                    result
                }
                WriteReleaseMode::Safe => {
                    let result = self.cache.write_back(&record, true);
                    if result.is_ok() {
                        self.meta.dirty.store(false, Ordering::Release);
                    }
                    result
                }
            }
        } else {
            Ok(())
        }
    }
}

impl Drop for MetaHandle {
    fn drop(&mut self) {
        if !self.released {
            self.meta.refcount.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

struct CacheInner {
    map: RwLock<HashMap<ImageId, Entry>>,
    store: Arc<dyn MetadataStore>,
    sidecar: Option<Arc<dyn SidecarStore>>,
    capacity: usize,
    clock: AtomicU64,
}

impl CacheInner {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn write_back(&self, record: &ImageRecord, with_sidecar: bool) -> DevelopResult<()> {
        self.store.save(record).map_err(|e| match e {
            DevelopError::PersistenceFailure { .. } => e,
            other => DevelopError::PersistenceFailure {
                image_id: record.id().0,
                message: other.to_string(),
            },
        })?;
        if with_sidecar {
            if let Some(sidecar) = &self.sidecar {
                let blob = Vec::new(); // history is serialized by dev-graph; nothing to carry yet here
                sidecar
                    .save(record.id(), &record.fullpath, &blob)
                    .map_err(|e| DevelopError::PersistenceFailure {
                        image_id: record.id().0,
                        message: e.to_string(),
                    })?;
            }
        }
        // Called both on its own (via `release`, with `map` unlocked) and
        // from inside eviction (with `map` already write-locked), so it
        // must not re-acquire `map` itself. Callers clear the dirty bit.
        Ok(())
    }

    /// Evict refcount-0 entries, oldest-accessed first, until under
    /// `capacity`. Dirty entries are written back before reclaiming.
    fn evict_if_over_capacity(&self) {
        let mut map = self.map.write().expect("metacache poisoned");
        if map.len() <= self.capacity {
            return;
        }
        let mut candidates: Vec<(ImageId, u64)> = map
            .iter()
            .filter(|(_, e)| e.meta.refcount.load(Ordering::Acquire) == 0)
            .map(|(id, e)| (*id, e.meta.last_access.load(Ordering::Acquire)))
            .collect();
        candidates.sort_by_key(|(_, clock)| *clock);

        let over = map.len() - self.capacity;
        for (id, _) in candidates.into_iter().take(over) {
            if let Some(entry) = map.get(&id) {
                if entry.meta.dirty.load(Ordering::Acquire) {
                    let snapshot = entry.payload.read().clone();
                    if let Err(err) = self.write_back(&snapshot, true) {
                        trace!(target: "metacache", ?id, %err, "eviction_write_back_failed");
                        continue;
                    }
                    entry.meta.dirty.store(false, Ordering::Release);
                }
            }
            map.remove(&id);
            trace!(target: "metacache", ?id, "evicted");
        }
    }
}

/// The develop engine's metadata cache (spec §4.A). Cheap to clone — all
/// state lives behind `Arc`.
#[derive(Clone)]
pub struct MetadataCache {
    inner: Arc<CacheInner>,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn MetadataStore>, sidecar: Option<Arc<dyn SidecarStore>>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                map: RwLock::new(HashMap::new()),
                store,
                sidecar,
                capacity,
                clock: AtomicU64::new(0),
            }),
        }
    }

    fn acquire(&self, id: ImageId, mode: LockMode, entry: &Entry) -> MetaHandle {
        entry.meta.refcount.fetch_add(1, Ordering::AcqRel);
        entry.meta.last_access.store(self.inner.tick(), Ordering::Release);
        let guard = match mode {
            LockMode::Read => HandleGuard::Read(entry.payload.read_arc()),
            LockMode::Write => HandleGuard::Write(entry.payload.write_arc()),
        };
        MetaHandle {
            id,
            guard,
            meta: entry.meta.clone(),
            cache: self.inner.clone(),
            released: false,
        }
    }

    fn insert_loaded_or_unknown(&self, id: ImageId) -> Entry {
        let record = if id.0 < 0 {
            ImageRecord::new_unknown(id)
        } else {
            self.inner.store.load(id).unwrap_or_else(|| ImageRecord::new_unknown(id))
        };
        let clock = self.inner.tick();
        let entry = Entry::new(record, clock);
        self.inner
            .map
            .write()
            .expect("metacache poisoned")
            .insert(id, entry.clone());
        entry
    }

    /// Blocks until the entry for `id` is available under `mode`, loading
    /// from the relational store (or zero-initializing, for `id<0`) on
    /// first touch.
    pub fn get(&self, id: ImageId, mode: LockMode) -> MetaHandle {
        let existing = self.inner.map.read().expect("metacache poisoned").get(&id).cloned();
        let entry = existing.unwrap_or_else(|| {
            let e = self.insert_loaded_or_unknown(id);
            self.inner.evict_if_over_capacity();
            e
        });
        self.acquire(id, mode, &entry)
    }

    /// Non-blocking variant: never loads, returns `None` if absent.
    /// parking_lot's try-lock would be needed for true non-blocking
    /// contention behavior; we keep the presence check non-blocking and
    /// delegate lock acquisition to the same `acquire` path.
    pub fn try_get(&self, id: ImageId, mode: LockMode) -> Option<MetaHandle> {
        let entry = self.inner.map.read().expect("metacache poisoned").get(&id).cloned()?;
        Some(self.acquire(id, mode, &entry))
    }

    /// Reloads from the relational store unconditionally before returning.
    pub fn get_reload(&self, id: ImageId, mode: LockMode) -> MetaHandle {
        let fresh = self.inner.store.load(id).unwrap_or_else(|| ImageRecord::new_unknown(id));
        let clock = self.inner.tick();
        let entry = {
            let mut map = self.inner.map.write().expect("metacache poisoned");
            match map.get(&id) {
                Some(existing) => {
                    *existing.payload.write() = fresh;
                    existing.meta.last_access.store(clock, Ordering::Release);
                    existing.clone()
                }
                None => {
                    let e = Entry::new(fresh, clock);
                    map.insert(id, e.clone());
                    e
                }
            }
        };
        self.acquire(id, mode, &entry)
    }

    /// Inserts a fully-formed record without touching the store.
    pub fn seed(&self, record: ImageRecord) -> SeedOutcome {
        if record.invalid() {
            return SeedOutcome::Failed;
        }
        let id = record.id();
        let mut map = self.inner.map.write().expect("metacache poisoned");
        if map.contains_key(&id) {
            return SeedOutcome::Present;
        }
        let clock = self.inner.tick();
        map.insert(id, Entry::new(record, clock));
        drop(map);
        self.inner.evict_if_over_capacity();
        SeedOutcome::Inserted
    }

    /// Removes the entry, releasing cache storage. This is not a store
    /// deletion — the relational row (and sidecar) survive.
    pub fn remove(&self, id: ImageId) {
        self.inner.map.write().expect("metacache poisoned").remove(&id);
    }

    fn stamp<F: FnOnce(&mut ImageRecord)>(&self, id: ImageId, f: F) {
        let mut handle = self.get(id, LockMode::Write);
        f(&mut handle);
        let _ = handle.release(WriteReleaseMode::Relaxed);
    }

    pub fn set_export_timestamp(&self, id: ImageId, at: i64) {
        self.stamp(id, |r| r.timestamps.exported = Some(at));
    }

    pub fn set_print_timestamp(&self, id: ImageId, at: i64) {
        self.stamp(id, |r| r.timestamps.printed = Some(at));
    }

    pub fn set_change_timestamp(&self, id: ImageId, at: i64) {
        self.stamp(id, |r| r.timestamps.changed = Some(at));
    }

    pub fn len(&self) -> usize {
        self.inner.map.read().expect("metacache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
