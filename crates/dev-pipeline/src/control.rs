//! The atomics and coalescing state an executor's worker thread and its
//! controlling [`crate::PipelineHandle`] share (spec §3 "Pipeline", §4.E, §5).

use crate::status::{AtomicStatus, PipelineStatus};
use dev_graph::ChangeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Shared control block for one pipeline instance.
pub struct PipelineControl {
    pub status: AtomicStatus,
    pub shutdown: AtomicBool,
    pub running: AtomicBool,
    pub processing: AtomicBool,
    pub timeout_micros: AtomicU64,
    pub reentry: AtomicBool,
    pub reentry_hash: AtomicU64,
    pending_change: Mutex<Option<ChangeSet>>,
}

impl Default for PipelineControl {
    fn default() -> Self {
        Self {
            status: AtomicStatus::default(),
            shutdown: AtomicBool::new(false),
            running: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            timeout_micros: AtomicU64::new(0),
            reentry: AtomicBool::new(false),
            reentry_hash: AtomicU64::new(0),
            pending_change: Mutex::new(None),
        }
    }
}

impl PipelineControl {
    /// A history mutation happens-before the next wake: bump DIRTY and set
    /// the kill-switch before releasing the history write lock (spec §5
    /// "Ordering guarantees").
    pub fn mark_dirty(&self, change: ChangeSet) {
        let mut pending = self.pending_change.lock().expect("pipeline control poisoned");
        *pending = Some(escalate(*pending, change));
        self.status.store(PipelineStatus::Dirty);
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn take_pending_change(&self) -> Option<ChangeSet> {
        self.pending_change.lock().expect("pipeline control poisoned").take()
    }

    pub fn request_reentry(&self, hash: u64) {
        self.reentry_hash.store(hash, Ordering::Release);
        self.reentry.store(true, Ordering::Release);
    }

    /// Only the setter, recognized by matching hash, may clear it (spec
    /// §4.E "Re-entry").
    pub fn clear_reentry_if_owner(&self, hash: u64) -> bool {
        if self.reentry_hash.load(Ordering::Acquire) == hash {
            self.reentry.store(false, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// The ROI changed between iterations; the setter's hash is no longer
    /// valid, so force-reset to avoid deadlock (spec §4.E "Re-entry").
    pub fn force_reset_reentry(&self) {
        self.reentry.store(false, Ordering::Release);
    }
}

/// `Synch`/`Remove` subsume `TopChanged`; `Zoomed` never escalates past a
/// pending content change (spec §4.C "commits a change set").
fn escalate(existing: Option<ChangeSet>, incoming: ChangeSet) -> ChangeSet {
    use ChangeSet::*;
    match (existing, incoming) {
        (Some(Synch), _) | (_, Synch) => Synch,
        (Some(Remove), _) | (_, Remove) => Remove,
        (Some(TopChanged), Zoomed) => TopChanged,
        (_, other) => other,
    }
}
