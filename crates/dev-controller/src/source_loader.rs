//! The full-resolution source-buffer loader the controller calls on
//! `load_image` (spec §4.F step 1). File-format decoding is explicitly out
//! of scope (spec §1 Non-goals), so this is a narrow seam a real decoder
//! plugs into; [`SyntheticLoader`] stands in for tests and the CLI demo.

use dev_graph::Buffer;
use dev_types::{DevelopResult, ImageRecord};

pub trait SourceLoader: Send + Sync {
    /// Blocking decode of `record`'s full-resolution pixels.
    fn load(&self, record: &ImageRecord) -> DevelopResult<Buffer>;
}

/// Generates a flat mid-gray buffer sized from the record's `width`/
/// `height` (falling back to a small default when they're still unknown,
/// e.g. a record freshly seeded before its first real decode).
pub struct SyntheticLoader;

impl SourceLoader for SyntheticLoader {
    fn load(&self, record: &ImageRecord) -> DevelopResult<Buffer> {
        let width = if record.width > 0 { record.width } else { 64 };
        let height = if record.height > 0 { record.height } else { 64 };
        let mut buffer = Buffer::new(width, height, 4);
        buffer.data.iter_mut().for_each(|v| *v = 0.5);
        Ok(buffer)
    }
}
