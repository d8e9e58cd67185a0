//! [`CacheEntry`] bookkeeping and the lock-mode vocabulary for [`crate::PixelCache`].

use crate::buffer::ImageBuffer;
use dev_types::{PixelCacheKey, PipelineType};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU64};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// One resident pixel-cache slot. `refcount` gates eviction (spec §4.B
/// invariant: a buffer still participating in the running pipeline must
/// hold `refcount >= 1`).
pub struct CacheEntry {
    pub key: PixelCacheKey,
    pub buffer: Arc<RwLock<ImageBuffer>>,
    pub refcount: AtomicI64,
    pub last_access: AtomicU64,
    pub byte_size: u64,
}

impl CacheEntry {
    pub fn new(key: PixelCacheKey, buffer: ImageBuffer, clock: u64) -> Arc<Self> {
        let byte_size = buffer.byte_size();
        Arc::new(Self {
            key,
            buffer: Arc::new(RwLock::new(buffer)),
            refcount: AtomicI64::new(0),
            last_access: AtomicU64::new(clock),
            byte_size,
        })
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.key.pipeline_type
    }
}
