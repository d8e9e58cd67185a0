//! The closed operator capability set (spec §6 "Operator contract", §9
//! "Dynamic dispatch over operators"). Implemented as a vtable trait plus a
//! name-keyed registry, per the redesign note: the source's operators are a
//! fixed, enumerable set, not an open plugin surface.

use dev_pixelcache::RasterMaskChannel;
use dev_types::{DevelopError, DistortDirection, Point, Roi};
use std::collections::HashMap;
use std::sync::Arc;

bitflags::bitflags! {
    /// Module capability flags (spec §6: "module flags (e.g. ONE_INSTANCE)").
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ModuleFlags: u32 {
        const ONE_INSTANCE = 1 << 0;
        const NO_MASKS     = 1 << 1;
    }
}

/// Return-code-style control flow for `process` (spec §9 "Exceptions /
/// long-running loops"): abort is a control-flow signal, not an error.
/// `MaskMiss` is likewise control flow, not a hard failure: the executor
/// reacts to it by requesting re-entry against the named producer piece
/// (spec §4.E "Re-entry", §4.G, §7 `IntegrityViolation`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorOutcome {
    Done,
    Aborted,
    Failed(String),
    MaskMiss { source_op: String, mask_id: u32 },
}

/// Input handed to `process`: the committed parameter/blend blobs for this
/// invocation, the planned input/output ROI, and the raster mask channel
/// (spec §4.G) this invocation's producers publish into and consumers read
/// from.
pub struct ProcessArgs<'a> {
    pub params: &'a [u8],
    pub blend_params: &'a [u8],
    pub input: &'a crate::buffer_shim::Buffer,
    pub roi_in: Roi,
    pub roi_out: Roi,
    pub masks: &'a RasterMaskChannel,
}

/// The closed operator capability set (spec §6).
pub trait Operator: Send + Sync {
    fn name(&self) -> &str;

    fn default_params(&self) -> Vec<u8>;

    /// Size in bytes of this operator's committed parameter blob (spec §6
    /// operator contract). Operators with a fixed-size params struct should
    /// override this directly rather than paying for a `default_params`
    /// allocation just to measure it.
    fn params_size(&self) -> usize {
        self.default_params().len()
    }

    fn flags(&self) -> ModuleFlags {
        ModuleFlags::empty()
    }

    /// Given the piece's input ROI, what output ROI does it emit (spec §4.D
    /// forward pass). Identity for operators that don't reshape the frame.
    fn modify_roi_out(&self, _params: &[u8], roi_in: Roi) -> Roi {
        roi_in
    }

    /// Given the requested output ROI, what input ROI is needed (spec §4.D
    /// backward pass). Identity for operators that don't reshape the frame.
    fn modify_roi_in(&self, _params: &[u8], roi_out: Roi) -> Roi {
        roi_out
    }

    /// Warp a batch of coordinates through this operator (spec §4.D
    /// `distort_transform`/its inverse).
    fn distort_transform(&self, _params: &[u8], points: &[Point], _direction: DistortDirection) -> Vec<Point> {
        points.to_vec()
    }

    /// Run the transform. Implementations must poll the kill-switch at
    /// documented suspension points and return `Aborted` promptly (spec
    /// §4.E "Kill-switch semantics").
    fn process(&self, args: ProcessArgs<'_>, output: &mut crate::buffer_shim::Buffer) -> OperatorOutcome;

    /// Tiled/offloaded variant of `process` (spec §6 operator contract,
    /// §4.E tiling/offload seam): `None` means this operator has no tiled
    /// path and the scheduler should fall back to whole-buffer `process`.
    fn process_tiled(&self, _args: &ProcessArgs<'_>, _output: &mut crate::buffer_shim::Buffer) -> Option<OperatorOutcome> {
        None
    }

    /// Validate/normalize a just-committed parameter blob (spec §6
    /// `commit_params`).
    fn commit_params(&self, _params: &mut Vec<u8>, _blend: &mut Vec<u8>) {}
}

/// Maps a stable operator name to its vtable (spec §9).
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operator: Arc<dyn Operator>) {
        self.operators.insert(operator.name().to_string(), operator);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Operator>, DevelopError> {
        self.get(name).ok_or_else(|| DevelopError::OperatorFailure {
            operator: name.to_string(),
            message: "not registered".to_string(),
        })
    }

    /// Every registered operator name, for callers that instantiate one
    /// module stack entry per known operator (spec §4.F `load_image`).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
