//! The "mipmap collaborator" contract (spec §6): the pipeline's full-
//! resolution source-buffer provider.

use dev_graph::Buffer;
use dev_types::ImageId;

pub trait SourceProvider: Send + Sync {
    /// Blocking fetch of the full-resolution source buffer for `id`.
    /// `None` means the input is unavailable (spec §4.E "Input image buffer
    /// unavailable from collaborator ⇒ executor skips processing").
    fn get(&self, id: ImageId) -> Option<Buffer>;
}

/// An in-memory test double standing in for the real mipmap cache.
#[derive(Default)]
pub struct StaticSourceProvider {
    buffers: std::sync::Mutex<std::collections::HashMap<ImageId, Buffer>>,
}

impl StaticSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: ImageId, buffer: Buffer) {
        self.buffers.lock().expect("source provider poisoned").insert(id, buffer);
    }
}

impl SourceProvider for StaticSourceProvider {
    fn get(&self, id: ImageId) -> Option<Buffer> {
        self.buffers.lock().expect("source provider poisoned").get(&id).cloned()
    }
}
