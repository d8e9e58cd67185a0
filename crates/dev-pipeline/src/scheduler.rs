//! The tiling/offload seam (spec §4.E): how the executor actually invokes
//! an operator's `process`. Out-of-process/GPU backends plug in here later
//! without touching the executor loop (spec §1 excludes *providing* such a
//! backend, not the seam for one).

use dev_graph::{Operator, OperatorOutcome, ProcessArgs};

/// Dispatches one piece's `process` call. Implementations decide whether to
/// run the whole buffer at once or split it into tiles; the executor only
/// sees the resulting [`OperatorOutcome`].
pub trait TileScheduler: Send + Sync {
    fn dispatch(&self, op: &dyn Operator, args: ProcessArgs<'_>, output: &mut dev_graph::Buffer) -> OperatorOutcome;
}

/// Runs every piece whole-buffer, in the calling thread. Prefers an
/// operator's `process_tiled` when it offers one, else falls back to
/// `process`. The default scheduler until a real tiling/offload backend is
/// wired in.
#[derive(Default)]
pub struct InProcessScheduler;

impl TileScheduler for InProcessScheduler {
    fn dispatch(&self, op: &dyn Operator, args: ProcessArgs<'_>, output: &mut dev_graph::Buffer) -> OperatorOutcome {
        match op.process_tiled(&args, output) {
            Some(outcome) => outcome,
            None => op.process(args, output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dev_graph::{Buffer, ModuleFlags};
    use dev_pixelcache::RasterMaskChannel;
    use dev_types::{DistortDirection, Point, Roi};

    struct Passthrough;
    impl Operator for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }
        fn default_params(&self) -> Vec<u8> {
            Vec::new()
        }
        fn flags(&self) -> ModuleFlags {
            ModuleFlags::empty()
        }
        fn distort_transform(&self, _params: &[u8], points: &[Point], _direction: DistortDirection) -> Vec<Point> {
            points.to_vec()
        }
        fn process(&self, args: ProcessArgs<'_>, output: &mut Buffer) -> OperatorOutcome {
            *output = args.input.clone();
            OperatorOutcome::Done
        }
    }

    struct Tiled;
    impl Operator for Tiled {
        fn name(&self) -> &str {
            "tiled"
        }
        fn default_params(&self) -> Vec<u8> {
            Vec::new()
        }
        fn flags(&self) -> ModuleFlags {
            ModuleFlags::empty()
        }
        fn distort_transform(&self, _params: &[u8], points: &[Point], _direction: DistortDirection) -> Vec<Point> {
            points.to_vec()
        }
        fn process(&self, _args: ProcessArgs<'_>, _output: &mut Buffer) -> OperatorOutcome {
            panic!("process_tiled should have been preferred");
        }
        fn process_tiled(&self, args: &ProcessArgs<'_>, output: &mut Buffer) -> Option<OperatorOutcome> {
            *output = args.input.clone();
            Some(OperatorOutcome::Done)
        }
    }

    #[test]
    fn falls_back_to_process_when_no_tiled_path() {
        let scheduler = InProcessScheduler;
        let masks = RasterMaskChannel::new();
        let input = Buffer::new(2, 2, 1);
        let mut output = Buffer::default();
        let outcome = scheduler.dispatch(
            &Passthrough,
            ProcessArgs {
                params: &[],
                blend_params: &[],
                input: &input,
                roi_in: Roi::full(2, 2, 1.0),
                roi_out: Roi::full(2, 2, 1.0),
                masks: &masks,
            },
            &mut output,
        );
        assert_eq!(outcome, OperatorOutcome::Done);
        assert_eq!(output.width, 2);
    }

    #[test]
    fn prefers_process_tiled_when_available() {
        let scheduler = InProcessScheduler;
        let masks = RasterMaskChannel::new();
        let input = Buffer::new(3, 3, 1);
        let mut output = Buffer::default();
        let outcome = scheduler.dispatch(
            &Tiled,
            ProcessArgs {
                params: &[],
                blend_params: &[],
                input: &input,
                roi_in: Roi::full(3, 3, 1.0),
                roi_out: Roi::full(3, 3, 1.0),
                masks: &masks,
            },
            &mut output,
        );
        assert_eq!(outcome, OperatorOutcome::Done);
        assert_eq!(output.width, 3);
    }
}
