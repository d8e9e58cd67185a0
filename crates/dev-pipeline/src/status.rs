//! [`PipelineStatus`]: the small state machine each pipeline's `status`
//! field walks through (spec §3 "Pipeline").

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineStatus {
    Dirty = 0,
    Undef = 1,
    Valid = 2,
    Invalid = 3,
}

impl PipelineStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineStatus::Dirty,
            1 => PipelineStatus::Undef,
            2 => PipelineStatus::Valid,
            _ => PipelineStatus::Invalid,
        }
    }
}

/// An atomic cell for [`PipelineStatus`].
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub fn new(initial: PipelineStatus) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, status: PipelineStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

impl Default for AtomicStatus {
    fn default() -> Self {
        Self::new(PipelineStatus::Dirty)
    }
}
