//! Shared identifiers, records, hashes and errors for the develop-engine
//! workspace. Kept dependency-free of the caches/pipeline crates so every
//! other crate can depend on it without a cycle.

mod error;
mod flags;
mod hash;
mod ids;
mod image_record;
mod roi;

pub use error::{DevelopError, DevelopResult};
pub use flags::{ImageFlags, Rating};
pub use hash::{
    GlobalHash, MaskHash, ParamsHash, PixelCacheKey, RasterMaskRef, global_hash, params_hash,
    seed_hash,
};
pub use ids::{ImageId, OperatorName, PipelineType};
pub use image_record::{ExifInfo, GeoLocation, Grouping, ImageRecord, ImageTimestamps, Orientation};
pub use roi::{DistortDirection, Point, Roi};
