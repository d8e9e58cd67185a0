//! The ROI planner (spec §4.D): two passes over the piece list plus the
//! distort-transform helpers that share its traversal order.

use crate::graph::PipelineGraph;
use crate::operator::OperatorRegistry;
use dev_types::{DistortDirection, Point, PipelineType, Roi};

/// Policy governing how the currently-active GUI module's downstream
/// distortions are suppressed while it's being interactively edited (spec
/// §4.D "Active-module override").
pub fn active_disables_current(current: Option<&str>, candidate: &str) -> bool {
    current == Some(candidate)
}

/// Forward pass: for each piece in order, ask its operator what ROI it
/// emits given its input ROI. Sets `roi_out` on each piece and returns the
/// final output ROI.
pub fn plan_roi_out(graph: &mut PipelineGraph, registry: &OperatorRegistry, input_roi: Roi) -> Roi {
    let mut current = input_roi;
    for piece in graph.pieces_mut() {
        piece.roi_in = current;
        let out = match registry.get(&piece.operator) {
            Some(op) if piece.enabled => op.modify_roi_out(&piece.params, current),
            _ => current,
        };
        piece.roi_out = out;
        current = out;
    }
    current
}

/// Backward pass: for each piece from last to first, given the final
/// requested ROI compute the input ROI needed to satisfy it. Sets `roi_in`
/// on each piece (refining the forward pass's provisional value) and
/// returns the ROI required of the pipeline's input buffer.
pub fn plan_roi_in(graph: &mut PipelineGraph, registry: &OperatorRegistry, requested_roi: Roi) -> Roi {
    let mut current = requested_roi;
    for piece in graph.pieces_mut().iter_mut().rev() {
        let needed = match registry.get(&piece.operator) {
            Some(op) if piece.enabled => op.modify_roi_in(&piece.params, current),
            _ => current,
        };
        piece.roi_in = needed;
        current = needed;
    }
    current
}

/// `natural_scale = min(viewport_w / processed_w, viewport_h / processed_h, 1) * device_ppd`
/// (spec §4.F). FULL pipelines additionally combine the user's `roi.scale`;
/// PREVIEW always renders the whole image at its own natural scale.
pub fn natural_scale(
    viewport_w: f64,
    viewport_h: f64,
    processed_w: f64,
    processed_h: f64,
    device_ppd: f64,
    pipeline_type: PipelineType,
    user_scale: f64,
) -> f64 {
    let fit = (viewport_w / processed_w).min(viewport_h / processed_h).min(1.0) * device_ppd;
    match pipeline_type {
        PipelineType::Full => fit * user_scale,
        _ => fit,
    }
}

/// Warps a batch of points through the piece list in the given direction
/// (spec §4.D `distort_transform`/its inverse). `Forward` walks pieces
/// first to last (input raster -> output space); `Backward` walks last to
/// first. `active_module` is suppressed per `active_disables_current`.
pub fn distort_transform(
    graph: &PipelineGraph,
    registry: &OperatorRegistry,
    points: &[Point],
    direction: DistortDirection,
    active_module: Option<&str>,
) -> Vec<Point> {
    let mut current = points.to_vec();
    let pieces: Box<dyn Iterator<Item = &crate::piece::Piece>> = match direction {
        DistortDirection::Forward => Box::new(graph.pieces().iter()),
        DistortDirection::Backward => Box::new(graph.pieces().iter().rev()),
    };
    for piece in pieces {
        if !piece.enabled || active_disables_current(active_module, &piece.operator) {
            continue;
        }
        if let Some(op) = registry.get(&piece.operator) {
            current = op.distort_transform(&piece.params, &current, direction);
        }
    }
    current
}
