//! [`ImageRecord`] — the unit of the metadata cache (spec §3, §4.A).

use crate::flags::{ImageFlags, Rating};
use crate::ids::ImageId;

/// Orientation as stored by the relational contract (EXIF-style 1..=8; 0 is
/// "unknown", the well-defined unknown value required by spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Orientation(pub u8);

impl Orientation {
    pub const UNKNOWN: Orientation = Orientation(0);
}

/// WGS84 geolocation. `None` is the well-defined "unknown" value; a record
/// never carries only one of latitude/longitude.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GeoLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
}

/// Camera/lens/exposure attributes. Unknown numeric fields are `None`;
/// unknown strings are empty, matching the relational columns in spec §6.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ExifInfo {
    pub maker: String,
    pub model: String,
    pub lens: String,
    pub exposure: Option<f32>,
    pub aperture: Option<f32>,
    pub iso: Option<f32>,
    pub focal_length: Option<f32>,
    pub focus_distance: Option<f32>,
    pub datetime_taken: Option<i64>,
}

/// Unix-epoch-seconds timestamps, `None` meaning "never happened" (the
/// well-defined unknown value for each, per spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ImageTimestamps {
    pub imported: Option<i64>,
    pub changed: Option<i64>,
    pub exported: Option<i64>,
    pub printed: Option<i64>,
    pub captured: Option<i64>,
}

/// Grouping: an image can be the representative of a burst/bracket group.
/// Invariant: `group_id == id` and `group_members >= 1` when the image is
/// its own group's representative; `group_id != id` implies it belongs to
/// another representative's group and `group_members` on *this* record is
/// meaningless (always read from the representative).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grouping {
    pub group_id: ImageId,
    pub group_members: u32,
}

impl Grouping {
    pub fn solo(id: ImageId) -> Self {
        Self {
            group_id: id,
            group_members: 1,
        }
    }

    pub fn is_consistent(self, id: ImageId) -> bool {
        if self.group_id == id {
            self.group_members >= 1
        } else {
            true
        }
    }
}

/// The full per-image record managed by the metadata cache.
///
/// `id` is immutable identity; every other field is mutated only under the
/// cache entry's write lock (spec §3 "ImageRecord").
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    id: ImageId,

    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,

    pub flags: ImageFlags,
    pub rating: Rating,

    pub timestamps: ImageTimestamps,
    pub exif: ExifInfo,
    pub geo: GeoLocation,

    pub filename: String,
    pub fullpath: String,
    pub folder: String,

    pub grouping: Grouping,
    pub history_len: u32,
    pub color_labels: u8,
}

impl ImageRecord {
    /// A freshly zero-initialized record, per `dev-metacache::get` when
    /// `id < 0` (spec §4.A) or for an explicit import insert.
    pub fn new_unknown(id: ImageId) -> Self {
        Self {
            id,
            width: 0,
            height: 0,
            orientation: Orientation::UNKNOWN,
            flags: ImageFlags::empty(),
            rating: Rating::UNKNOWN,
            timestamps: ImageTimestamps::default(),
            exif: ExifInfo::default(),
            geo: GeoLocation::default(),
            filename: String::new(),
            fullpath: String::new(),
            folder: String::new(),
            grouping: Grouping::solo(id),
            history_len: 0,
            color_labels: 0,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    /// True when essential identity fields are missing, letting callers bail
    /// out early (spec §4.A "Coalescing fields").
    pub fn invalid(&self) -> bool {
        self.id.0 <= 0 || self.filename.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unknown_has_well_defined_unknown_fields() {
        let rec = ImageRecord::new_unknown(ImageId(42));
        assert_eq!(rec.orientation, Orientation::UNKNOWN);
        assert_eq!(rec.timestamps.imported, None);
        assert!(rec.exif.maker.is_empty());
        assert_eq!(rec.id(), ImageId(42));
    }

    #[test]
    fn invalid_flags_missing_filename() {
        let mut rec = ImageRecord::new_unknown(ImageId(1));
        assert!(rec.invalid());
        rec.filename = "a.raw".into();
        assert!(!rec.invalid());
    }

    #[test]
    fn grouping_solo_is_self_consistent() {
        let id = ImageId(7);
        let g = Grouping::solo(id);
        assert!(g.is_consistent(id));
    }
}
