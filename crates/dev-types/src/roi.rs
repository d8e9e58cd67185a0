//! Region-of-interest and the operator capability flags that travel with it.

/// `(x, y, width, height, scale)` in the coordinate system of a specific
/// buffer (spec glossary "ROI").
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Roi {
    pub fn full(width: u32, height: u32, scale: f32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            scale,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0 || self.scale <= 0.0
    }
}

/// A 2D point in a buffer's coordinate space, used by
/// `distort_transform`/`distort_backtransform` (spec §4.D, §6).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Direction an array of points is warped through the piece list (spec §4.D).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistortDirection {
    /// Input raster space -> final output space, walking pieces first to last.
    Forward,
    /// Final output space -> input raster space, walking pieces last to first.
    Backward,
}
