//! Identity newtypes shared across the develop-engine crates.

use std::fmt;

/// Identity of an image record. Positive when it names a row in the
/// relational store; negative is the sentinel `dev-metacache::get` uses to
/// mean "freshly zero-initialized record for an import in progress" (spec §4.A).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub i32);

impl ImageId {
    pub const UNKNOWN: ImageId = ImageId(-1);

    pub fn is_pending_import(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of an operator module (its registry name), independent of
/// `multi_priority`/`multi_name` which distinguish *instances* of it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperatorName(pub String);

impl fmt::Display for OperatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OperatorName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which output a pipeline is driving. Export/Thumbnail disable intermediate
/// caching (spec §4.B "Sizing").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Preview,
    Full,
    Thumbnail,
    Export,
}

impl PipelineType {
    pub fn caches_intermediates(self) -> bool {
        matches!(self, PipelineType::Preview | PipelineType::Full)
    }
}
