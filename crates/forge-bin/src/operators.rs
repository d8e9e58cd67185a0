//! A minimal built-in operator set for the CLI demo. Real color-science
//! kernels are out of scope for the develop engine itself (the engine only
//! schedules and caches whatever the closed [`dev_graph::OperatorRegistry`]
//! set provides); these two stand in for it.

use dev_graph::{Buffer, ModuleFlags, Operator, OperatorOutcome, ProcessArgs};
use dev_types::{DistortDirection, Point};

/// Additive exposure compensation in the demo's normalized `[0, 1]` space.
/// `params` is a single little-endian `f32`: the stop adjustment.
pub struct Exposure;

impl Operator for Exposure {
    fn name(&self) -> &str {
        "exposure"
    }

    fn default_params(&self) -> Vec<u8> {
        0.0_f32.to_le_bytes().to_vec()
    }

    fn flags(&self) -> ModuleFlags {
        ModuleFlags::empty()
    }

    fn distort_transform(&self, _params: &[u8], points: &[Point], _direction: DistortDirection) -> Vec<Point> {
        points.to_vec()
    }

    fn process(&self, args: ProcessArgs<'_>, output: &mut Buffer) -> OperatorOutcome {
        let gain = args.params.try_into().map(f32::from_le_bytes).unwrap_or(0.0);
        output.width = args.input.width;
        output.height = args.input.height;
        output.channels = args.input.channels;
        output.data = args.input.data.iter().map(|v| (v + gain).clamp(0.0, 1.0)).collect();
        OperatorOutcome::Done
    }
}

/// Flips every channel around `1.0`. Takes no parameters; `ONE_INSTANCE`
/// since applying it twice is a no-op and stacking copies wastes a pipeline
/// slot (spec §4.F "Module duplication" exempts flagged operators).
pub struct Watermark;

impl Operator for Watermark {
    fn name(&self) -> &str {
        "watermark"
    }

    fn default_params(&self) -> Vec<u8> {
        Vec::new()
    }

    fn flags(&self) -> ModuleFlags {
        ModuleFlags::ONE_INSTANCE
    }

    fn distort_transform(&self, _params: &[u8], points: &[Point], _direction: DistortDirection) -> Vec<Point> {
        points.to_vec()
    }

    fn process(&self, args: ProcessArgs<'_>, output: &mut Buffer) -> OperatorOutcome {
        output.width = args.input.width;
        output.height = args.input.height;
        output.channels = args.input.channels;
        output.data = args.input.data.iter().map(|v| 1.0 - v).collect();
        OperatorOutcome::Done
    }
}
