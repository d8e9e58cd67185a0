//! Rolling hashes for pipeline pieces and the pixel cache (spec §3, §8 "Hash
//! monotonicity").
//!
//! Mirrors the teacher's use of `ahash` for fast non-cryptographic line
//! hashing (`core-render::partial_cache`), generalized here to fold a chain
//! of upstream hashes with per-piece parameters and ROI.

use crate::roi::Roi;
use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// Hash over an operator's hashable-prefix params blob, blend-params blob,
/// enabled flag and identity (spec §3 "PipelineOp").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ParamsHash(pub u64);

/// `params_hash` folded with the upstream piece's `global_hash` and the
/// current ROI (spec §3). Doubles as the 64-bit [`PixelCacheKey`] payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct GlobalHash(pub u64);

/// Analogous to `GlobalHash` but scoped to a raster mask (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MaskHash(pub u64);

fn hash_roi(hasher: &mut AHasher, roi: &Roi) {
    roi.x.hash(hasher);
    roi.y.hash(hasher);
    roi.width.hash(hasher);
    roi.height.hash(hasher);
    roi.scale.to_bits().hash(hasher);
}

/// Computes `params_hash` for one piece: identity + enabled + the hashable
/// prefix of params and blend-params.
pub fn params_hash(
    operator_name: &str,
    multi_priority: i32,
    enabled: bool,
    params_prefix: &[u8],
    blend_prefix: &[u8],
) -> ParamsHash {
    let mut hasher = AHasher::default();
    operator_name.hash(&mut hasher);
    multi_priority.hash(&mut hasher);
    enabled.hash(&mut hasher);
    params_prefix.hash(&mut hasher);
    blend_prefix.hash(&mut hasher);
    ParamsHash(hasher.finish())
}

/// Folds `upstream` (the previous piece's `global_hash`, or a fixed seed for
/// the first piece) with this piece's `params_hash` and `roi` (spec §3:
/// "global_hash of piece k is a pure function of (global_hash of k-1,
/// params_hash of k, ROI of k)").
pub fn global_hash(upstream: GlobalHash, this_params: ParamsHash, roi: &Roi) -> GlobalHash {
    let mut hasher = AHasher::default();
    upstream.0.hash(&mut hasher);
    this_params.0.hash(&mut hasher);
    hash_roi(&mut hasher, roi);
    GlobalHash(hasher.finish())
}

/// Seed `global_hash` fed to the first piece in a pipeline (folds the input
/// image id and buffer dimensions so two different source images never
/// collide on an empty stack).
pub fn seed_hash(image_id: i32, input_width: u32, input_height: u32) -> GlobalHash {
    let mut hasher = AHasher::default();
    image_id.hash(&mut hasher);
    input_width.hash(&mut hasher);
    input_height.hash(&mut hasher);
    GlobalHash(hasher.finish())
}

/// Key into the pixel cache (spec §3 "PixelCacheKey"): encodes operator
/// identity, parameters, blend parameters, enabled state, ROI and the
/// upstream key by construction, since it *is* that piece's `global_hash`
/// additionally tagged with the pipeline type it was produced for (flush by
/// type, spec §4.B `flush(pipelineType)`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelCacheKey {
    pub global_hash: GlobalHash,
    pub pipeline_type: crate::ids::PipelineType,
}

impl PixelCacheKey {
    pub fn new(global_hash: GlobalHash, pipeline_type: crate::ids::PipelineType) -> Self {
        Self {
            global_hash,
            pipeline_type,
        }
    }
}

/// `(sourceOp, maskId)` lookup key for the raster mask channel (spec §3
/// "RasterMaskRef").
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterMaskRef {
    pub source_op: String,
    pub mask_id: u32,
}
