//! The per-entry bookkeeping the cache keeps alongside each [`ImageRecord`]:
//! a refcount, a dirty bit, and a logical-clock stamp for LRU ordering.

use dev_types::ImageRecord;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};
use std::sync::Arc;

/// Which lock a caller wants from [`crate::MetadataCache::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// Write-back policy applied on [`crate::MetaHandle::release`], spec §4.A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteReleaseMode {
    /// Write back to the relational store and the on-disk sidecar.
    Safe,
    /// Write back to the relational store only.
    Relaxed,
    /// Discard any pending write; the caller coordinates persistence itself.
    Minimal,
}

/// Bookkeeping kept out-of-line from the record payload so a reader holding
/// the record lock doesn't also need to touch the refcount under it.
pub(crate) struct EntryMeta {
    pub refcount: AtomicI64,
    pub dirty: AtomicBool,
    pub last_access: AtomicU64,
}

impl EntryMeta {
    fn new(clock: u64) -> Self {
        Self {
            refcount: AtomicI64::new(0),
            dirty: AtomicBool::new(false),
            last_access: AtomicU64::new(clock),
        }
    }
}

/// One cache slot: the guarded payload plus its out-of-line bookkeeping.
#[derive(Clone)]
pub(crate) struct Entry {
    pub payload: Arc<RwLock<ImageRecord>>,
    pub meta: Arc<EntryMeta>,
}

impl Entry {
    pub fn new(record: ImageRecord, clock: u64) -> Self {
        Self {
            payload: Arc::new(RwLock::new(record)),
            meta: Arc::new(EntryMeta::new(clock)),
        }
    }
}
