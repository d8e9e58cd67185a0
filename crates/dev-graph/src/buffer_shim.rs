//! A minimal buffer shape operators process against. Deliberately distinct
//! from `dev-pixelcache::ImageBuffer` (the cache's stored representation,
//! keyed and refcounted) even though this crate does depend on
//! `dev-pixelcache` for the raster mask channel; `dev-pipeline` bridges the
//! two buffer representations at its boundary.

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Buffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<f32>,
}

impl Buffer {
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width as usize * height as usize * channels as usize],
        }
    }
}
