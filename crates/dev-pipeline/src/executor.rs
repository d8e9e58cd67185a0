//! The pipeline executor's worker-thread state machine (spec §4.E).

use crate::control::PipelineControl;
use crate::scheduler::TileScheduler;
use crate::source::SourceProvider;
use crate::status::PipelineStatus;
use dev_config::PipelineTiming;
use dev_events::{EventBus, Signal};
use dev_graph::{Buffer, ChangeSet, History, OperatorOutcome, OperatorRegistry, PipelineGraph, ProcessArgs};
use dev_pixelcache::{PixelCache, RasterMaskChannel};
use dev_types::{seed_hash, DevelopError, DevelopResult, ImageId, PipelineType, Roi};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{trace, warn};

/// Everything an executor's worker thread needs to run, shared with its
/// [`crate::PipelineHandle`] and sibling executor.
pub struct PipelineResources {
    pub image_id: Mutex<ImageId>,
    pub pipeline_type: PipelineType,
    pub history: Arc<RwLock<History>>,
    pub registry: Arc<OperatorRegistry>,
    pub pixel_cache: Arc<PixelCache>,
    pub source: Arc<dyn SourceProvider>,
    pub event_bus: EventBus,
    pub requested_roi: Mutex<Roi>,
    pub pipeline_threadsafe: Arc<Mutex<()>>,
    pub masks: RasterMaskChannel,
    pub scheduler: Arc<dyn TileScheduler>,
}

/// Handle the controller keeps for one executor: the shared control block,
/// the piece list (read by the controller for diagnostics), the wake
/// channel, and the worker's join handle.
pub struct PipelineHandle {
    control: Arc<PipelineControl>,
    resources: Arc<PipelineResources>,
    graph: Arc<Mutex<PipelineGraph>>,
    output_backbuf: Arc<Mutex<Option<Buffer>>>,
    wake_tx: crossbeam_channel::Sender<()>,
    exit: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn status(&self) -> PipelineStatus {
        self.control.status.load()
    }

    pub fn is_processing(&self) -> bool {
        self.control.processing.load(Ordering::Acquire)
    }

    pub fn is_joined(&self) -> bool {
        self.join.is_none()
    }

    pub fn backbuf(&self) -> Option<Buffer> {
        self.output_backbuf.lock().expect("backbuf mutex poisoned").clone()
    }

    /// Number of pieces in the current graph, for diagnostics/status display.
    pub fn piece_count(&self) -> usize {
        self.graph.lock().expect("graph mutex poisoned").pieces().len()
    }

    /// Chains a point through the current piece list's distortion, for the
    /// controller's coordinate-transform helpers (spec §4.F).
    pub fn distort_point(
        &self,
        point: dev_types::Point,
        direction: dev_types::DistortDirection,
        active_module: Option<&str>,
    ) -> dev_types::Point {
        let graph = self.graph.lock().expect("graph mutex poisoned");
        dev_graph::distort_transform(&graph, &self.resources.registry, &[point], direction, active_module)[0]
    }

    pub fn set_image(&self, id: ImageId) {
        *self.resources.image_id.lock().expect("image id mutex poisoned") = id;
    }

    pub fn set_requested_roi(&self, roi: Roi) {
        *self.resources.requested_roi.lock().expect("roi mutex poisoned") = roi;
    }

    /// Mark DIRTY with an incremental resync hint (top item only), spec
    /// §4.F `update_*`.
    pub fn update(&self) {
        self.control.mark_dirty(ChangeSet::TopChanged);
        self.wake();
    }

    /// Full rebuild next wake, spec §4.F `resync_*`.
    pub fn resync(&self) {
        self.control.mark_dirty(ChangeSet::Synch);
        self.wake();
    }

    /// ROI-only update, no history resync, spec §4.F `change_zoom_*`.
    pub fn change_zoom(&self, roi: Roi) {
        self.set_requested_roi(roi);
        self.control.mark_dirty(ChangeSet::Zoomed);
        self.wake();
    }

    pub fn set_timeout_micros(&self, micros: u64) {
        self.control.timeout_micros.store(micros, Ordering::Release);
    }

    pub fn request_reentry(&self, hash: u64) {
        self.control.request_reentry(hash);
    }

    fn wake(&self) {
        let _ = self.wake_tx.send(());
    }

    /// Sets the per-pipeline kill-switch and the global exit flag, then
    /// blocks until the worker thread notices and returns.
    pub fn shutdown_and_join(&mut self) {
        self.exit.store(true, Ordering::Release);
        self.control.shutdown.store(true, Ordering::Release);
        self.wake();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.shutdown_and_join();
        }
    }
}

/// Spawns the worker thread driving one pipeline (spec §4.E). `exit` is the
/// controller's global shutdown flag, shared across both executors.
pub fn spawn(resources: Arc<PipelineResources>, timing: PipelineTiming, exit: Arc<AtomicBool>) -> PipelineHandle {
    let control = Arc::new(PipelineControl::default());
    let graph = Arc::new(Mutex::new(PipelineGraph::new()));
    let output_backbuf = Arc::new(Mutex::new(None));
    let (wake_tx, wake_rx) = crossbeam_channel::unbounded();

    let worker_control = control.clone();
    let worker_graph = graph.clone();
    let worker_resources = resources.clone();
    let worker_output = output_backbuf.clone();
    let worker_exit = exit.clone();

    let join = std::thread::Builder::new()
        .name(format!("pipeline-{:?}", resources.pipeline_type))
        .spawn(move || {
            run_loop(
                worker_control,
                worker_resources,
                worker_graph,
                worker_output,
                wake_rx,
                worker_exit,
                timing,
            )
        })
        .expect("failed to spawn pipeline worker thread");

    PipelineHandle {
        control,
        resources,
        graph,
        output_backbuf,
        wake_tx,
        exit,
        join: Some(join),
    }
}

fn run_loop(
    control: Arc<PipelineControl>,
    resources: Arc<PipelineResources>,
    graph: Arc<Mutex<PipelineGraph>>,
    output_backbuf: Arc<Mutex<Option<Buffer>>>,
    wake_rx: crossbeam_channel::Receiver<()>,
    exit: Arc<AtomicBool>,
    timing: PipelineTiming,
) {
    let mut last_roi_out: Option<Roi> = None;

    while !exit.load(Ordering::Acquire) {
        let timeout = control.timeout_micros.swap(0, Ordering::AcqRel);
        if timeout > 0 {
            std::thread::sleep(Duration::from_micros(timeout));
        }

        let mut reentry_count = 0u8;
        while control.status.load() == PipelineStatus::Dirty && reentry_count < timing.max_reentries {
            control.processing.store(true, Ordering::Release);
            control.running.store(true, Ordering::Release);
            control.shutdown.store(false, Ordering::Release);

            let change = control.take_pending_change();
            let force_full = matches!(change, Some(ChangeSet::Synch) | Some(ChangeSet::Remove))
                || control.reentry.load(Ordering::Acquire);
            if force_full && PixelCache::caches(resources.pipeline_type) {
                resources.pixel_cache.flush(resources.pipeline_type);
            }

            resync_graph(&graph, &resources.history, change);

            let requested_roi = *resources.requested_roi.lock().expect("roi mutex poisoned");
            let out_roi = {
                let mut g = graph.lock().expect("graph mutex poisoned");
                let out = dev_graph::plan_roi_out(&mut g, &resources.registry, requested_roi);
                dev_graph::plan_roi_in(&mut g, &resources.registry, out);
                out
            };
            if last_roi_out.is_some_and(|prev| prev != out_roi) {
                control.force_reset_reentry();
            }
            last_roi_out = Some(out_roi);

            if control.shutdown.load(Ordering::Acquire) {
                control.processing.store(false, Ordering::Release);
                break;
            }

            control.status.store(PipelineStatus::Undef);

            let image_id = *resources.image_id.lock().expect("image id mutex poisoned");
            let run_result = {
                let _serialize = resources.pipeline_threadsafe.lock().expect("pipeline_threadsafe poisoned");
                let mut g = graph.lock().expect("graph mutex poisoned");
                run_pieces(&mut g, &resources, image_id, &control.shutdown, &control)
            };

            if control.reentry.load(Ordering::Acquire) {
                reentry_count += 1;
                control.status.store(PipelineStatus::Dirty);
                trace!(target: "pipeline.executor", pipeline = ?resources.pipeline_type, reentry_count, "reentry_captured");
                continue;
            }

            let shutdown_set = control.shutdown.load(Ordering::Acquire);
            match run_result {
                Ok(RunOutcome::Skipped) => {
                    // input unavailable: return to idle without publishing.
                }
                Ok(RunOutcome::Produced(buffer)) if control.status.load() == PipelineStatus::Undef => {
                    control.status.store(PipelineStatus::Valid);
                    *output_backbuf.lock().expect("backbuf mutex poisoned") = Some(buffer);
                    resources.event_bus.publish(finished_signal(resources.pipeline_type));
                }
                Ok(RunOutcome::Produced(_)) => {
                    // status was forced away from Undef mid-run; controller will have reset it.
                }
                Err(DevelopError::AbortedByShutdown) => {
                    trace!(target: "pipeline.executor", pipeline = ?resources.pipeline_type, "aborted_by_shutdown");
                }
                Err(err) if !shutdown_set => {
                    warn!(target: "pipeline.executor", pipeline = ?resources.pipeline_type, %err, "operator_failed");
                    control.status.store(PipelineStatus::Invalid);
                }
                Err(_) => {
                    // shutdown raced the failure; treat like any other abort.
                }
            }

            control.processing.store(false, Ordering::Release);
            std::thread::sleep(Duration::from_millis(timing.iteration_backoff_ms));
        }

        let _ = wake_rx.recv_timeout(Duration::from_millis(timing.idle_sleep_ms));
    }
}

fn resync_graph(graph: &Mutex<PipelineGraph>, history: &RwLock<History>, change: Option<ChangeSet>) {
    let history = history.read().expect("history rwlock poisoned");
    let mut g = graph.lock().expect("graph mutex poisoned");
    match change {
        Some(ChangeSet::TopChanged) => g.resync_incremental(&history),
        Some(ChangeSet::Zoomed) => {} // no resync needed
        _ => g.rebuild_full(&history),
    }
}

enum RunOutcome {
    Produced(Buffer),
    Skipped,
}

fn finished_signal(pipeline_type: PipelineType) -> Signal {
    match pipeline_type {
        PipelineType::Preview => Signal::DevelopPreviewPipeFinished(pipeline_type),
        _ => Signal::DevelopUiPipeFinished,
    }
}

/// Runs the piece list end to end: for each piece, compute `global_hash`,
/// consult the pixel cache, either reuse or recompute via the operator,
/// write back to cache. Polls `shutdown` between pieces (spec §4.E step h).
///
/// The mask channel is cleared at the start of every invocation (spec §4.G
/// "per-invocation maskId -> MaskBuffer table"): a piece only republishes
/// its masks when it actually reprocesses. A piece reused from the pixel
/// cache does not reprocess, so if a downstream piece consults a mask that
/// piece would have published, it misses and reports `MaskMiss`; this
/// function then requests re-entry against the producing piece's hash
/// (spec §4.E "Re-entry", §7 `IntegrityViolation`) so the next iteration's
/// forced cache flush makes the producer reprocess and republish.
fn run_pieces(
    graph: &mut PipelineGraph,
    resources: &PipelineResources,
    image_id: ImageId,
    shutdown: &AtomicBool,
    control: &PipelineControl,
) -> DevelopResult<RunOutcome> {
    resources.masks.clear();

    let Some(input) = resources.source.get(image_id) else {
        return Ok(RunOutcome::Skipped);
    };

    let seed = seed_hash(image_id.0, input.width, input.height);
    graph.recompute_hashes(seed);

    let caches = PixelCache::caches(resources.pipeline_type);
    let mut current = input;

    for piece in graph.pieces() {
        if shutdown.load(Ordering::Acquire) {
            return Err(DevelopError::AbortedByShutdown);
        }
        if !piece.enabled {
            continue;
        }

        let key = dev_types::PixelCacheKey::new(piece.global_hash, resources.pipeline_type);
        if caches {
            if let Some(handle) = resources.pixel_cache.lookup(key) {
                current = to_graph_buffer(&handle);
                handle.release();
                continue;
            }
        }

        let op = resources.registry.resolve(&piece.operator)?;
        let mut output = Buffer::new(piece.roi_out.width, piece.roi_out.height, current.channels);
        let outcome = resources.scheduler.dispatch(
            op.as_ref(),
            ProcessArgs {
                params: &piece.params,
                blend_params: &piece.blend_params,
                input: &current,
                roi_in: piece.roi_in,
                roi_out: piece.roi_out,
                masks: &resources.masks,
            },
            &mut output,
        );

        match outcome {
            OperatorOutcome::Done => {
                if caches {
                    resources.pixel_cache.insert(key, to_pixel_buffer(&output)).release();
                }
                current = output;
            }
            OperatorOutcome::Aborted => return Err(DevelopError::AbortedByShutdown),
            OperatorOutcome::Failed(message) => {
                return Err(DevelopError::OperatorFailure {
                    operator: piece.operator.clone(),
                    message,
                })
            }
            OperatorOutcome::MaskMiss { source_op, mask_id } => {
                let producer_hash = graph
                    .pieces()
                    .iter()
                    .find(|p| p.operator == source_op)
                    .map(|p| p.global_hash.0)
                    .unwrap_or(0);
                trace!(
                    target: "pipeline.executor",
                    pipeline = ?resources.pipeline_type,
                    source_op,
                    mask_id,
                    "mask_miss_requests_reentry"
                );
                control.request_reentry(producer_hash);
                return Ok(RunOutcome::Skipped);
            }
        }
    }

    if current.width == 0 || current.height == 0 {
        return Err(DevelopError::OperatorFailure {
            operator: "<pipeline>".into(),
            message: "output buffer is degenerate".into(),
        });
    }

    control.force_reset_reentry();
    Ok(RunOutcome::Produced(current))
}

fn to_pixel_buffer(buffer: &Buffer) -> dev_pixelcache::ImageBuffer {
    dev_pixelcache::ImageBuffer {
        width: buffer.width,
        height: buffer.height,
        channels: buffer.channels,
        data: buffer.data.clone(),
    }
}

fn to_graph_buffer(handle: &dev_pixelcache::PixelHandle) -> Buffer {
    Buffer {
        width: handle.width,
        height: handle.height,
        channels: handle.channels,
        data: handle.data.clone(),
    }
}
