//! Error kinds shared across the develop-engine crates (spec §7).

/// The error-kind vocabulary of spec §7. Concrete crates return this
/// directly or wrap it in a crate-local `thiserror` enum when they need
/// additional context fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DevelopError {
    /// Data requested is being loaded; retry later or block per caller choice.
    #[error("cache entry for {0} is loading")]
    TransientCacheMiss(String),

    /// The pixel cache cannot allocate after evicting everything evictable.
    #[error("cache exhausted, could not reserve {requested_bytes} bytes")]
    ResourceExhausted { requested_bytes: u64 },

    /// Kill-switch observed; iteration discarded, no diagnostic.
    #[error("aborted by shutdown")]
    AbortedByShutdown,

    /// Operator returned an error code.
    #[error("operator {operator} failed: {message}")]
    OperatorFailure { operator: String, message: String },

    /// Source buffer missing or degenerate.
    #[error("input unavailable for image {0}")]
    InputUnavailable(i32),

    /// A raster mask reference is missing mid-pipeline.
    #[error("raster mask {mask_id} missing from operator {source_op}")]
    IntegrityViolation { source_op: String, mask_id: u32 },

    /// Metadata or sidecar write-back failed.
    #[error("persistence failed for image {image_id}: {message}")]
    PersistenceFailure { image_id: i32, message: String },
}

pub type DevelopResult<T> = Result<T, DevelopError>;
