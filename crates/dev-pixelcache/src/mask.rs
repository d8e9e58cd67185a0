//! The raster mask channel (spec §4.G): each piece may publish a per-
//! invocation `maskId -> MaskBuffer` table that downstream pieces consult.

use crate::buffer::MaskBuffer;
use dev_types::{DevelopError, DevelopResult, RasterMaskRef};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Owns the published mask tables, keyed by `(source operator, mask id)`.
/// Cleared wholesale on cache flush, per spec §4.G.
#[derive(Clone, Default)]
pub struct RasterMaskChannel {
    tables: Arc<RwLock<HashMap<RasterMaskRef, Arc<MaskBuffer>>>>,
}

impl RasterMaskChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A piece publishes its masks for this invocation before the next
    /// piece runs.
    pub fn publish(&self, source_op: &str, mask_id: u32, buffer: MaskBuffer) {
        self.tables.write().expect("mask channel poisoned").insert(
            RasterMaskRef {
                source_op: source_op.to_string(),
                mask_id,
            },
            Arc::new(buffer),
        );
    }

    /// A downstream piece asks for mask `mask_id` from `source_op`. Missing
    /// masks are an integrity violation the caller acts on (set re-entry or
    /// flush the cache), per spec §4.G.
    pub fn retrieve(&self, source_op: &str, mask_id: u32) -> DevelopResult<Arc<MaskBuffer>> {
        let key = RasterMaskRef {
            source_op: source_op.to_string(),
            mask_id,
        };
        self.tables
            .read()
            .expect("mask channel poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| DevelopError::IntegrityViolation {
                source_op: source_op.to_string(),
                mask_id,
            })
    }

    /// Cleared on cache flush (spec §4.G).
    pub fn clear(&self) {
        self.tables.write().expect("mask channel poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.tables.read().expect("mask channel poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ImageBuffer;

    #[test]
    fn publish_then_retrieve_round_trips() {
        let channel = RasterMaskChannel::new();
        channel.publish("denoise", 1, ImageBuffer::new(4, 4, 1));
        let found = channel.retrieve("denoise", 1).unwrap();
        assert_eq!(found.width, 4);
    }

    #[test]
    fn missing_mask_is_integrity_violation() {
        let channel = RasterMaskChannel::new();
        let err = channel.retrieve("denoise", 9).unwrap_err();
        assert!(matches!(err, DevelopError::IntegrityViolation { .. }));
    }

    #[test]
    fn clear_drops_all_tables() {
        let channel = RasterMaskChannel::new();
        channel.publish("denoise", 1, ImageBuffer::new(4, 4, 1));
        channel.clear();
        assert!(channel.is_empty());
    }
}
