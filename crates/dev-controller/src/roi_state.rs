//! The controller's ROI descriptor: viewport size, zoom center/scale,
//! natural scale and border size (spec §4.F).

use dev_config::ZoomBounds;
use dev_types::{PipelineType, Roi};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiDescriptor {
    pub viewport_w: f64,
    pub viewport_h: f64,
    pub zoom_center_x: f64,
    pub zoom_center_y: f64,
    pub zoom_scale: f64,
    pub natural_scale: f64,
    pub border_size: u32,
}

impl Default for RoiDescriptor {
    fn default() -> Self {
        Self {
            viewport_w: 0.0,
            viewport_h: 0.0,
            zoom_center_x: 0.5,
            zoom_center_y: 0.5,
            zoom_scale: 1.0,
            natural_scale: 1.0,
            border_size: 0,
        }
    }
}

impl RoiDescriptor {
    /// Recomputes `natural_scale` against the processed image's full
    /// dimensions (spec §4.F "Natural scale and bounds").
    pub fn recompute_natural_scale(
        &mut self,
        processed_w: f64,
        processed_h: f64,
        device_ppd: f64,
        pipeline_type: PipelineType,
    ) {
        self.natural_scale =
            dev_graph::natural_scale(self.viewport_w, self.viewport_h, processed_w, processed_h, device_ppd, pipeline_type, self.zoom_scale);
    }

    /// Clamps `zoom_scale` so a device pixel never covers more than
    /// `max_pixel_factor` source pixels, and never shrinks past
    /// `min_fit_factor` of fit-to-viewport (spec §4.F).
    pub fn clamp_zoom(&mut self, bounds: ZoomBounds, device_ppd: f64) {
        let max = bounds.max_pixel_factor as f64 * device_ppd;
        let min = self.natural_scale * bounds.min_fit_factor as f64;
        self.zoom_scale = self.zoom_scale.clamp(min.min(max), max);
    }

    /// The ROI to hand the ROI planner for the given processed dimensions.
    pub fn to_roi(&self, processed_w: u32, processed_h: u32) -> Roi {
        Roi {
            x: 0,
            y: 0,
            width: processed_w,
            height: processed_h,
            scale: self.zoom_scale as f32,
        }
    }
}
