//! [`Engine`]: the Develop Controller (spec §4.F) — the single value that
//! owns both pipeline executors, the history, the module stack, the ROI
//! descriptor, the active GUI module, and the proxy hooks UI collaborators
//! attach to. Every operation that would have reached for process-wide
//! global state in the source system instead takes `&Engine`/`&mut Engine`
//! (spec §9 "mutable-global state").

use crate::history_sidecar;
use crate::history_store::HistorySidecarStore;
use crate::hooks::ProxyHooks;
use crate::modules::{ModuleInstance, ModuleStack};
use crate::roi_state::RoiDescriptor;
use crate::source_loader::SourceLoader;
use dev_config::EngineConfig;
use dev_events::{EventBus, Signal};
use dev_graph::OperatorRegistry;
use dev_metacache::{LockMode as MetaLockMode, MetadataCache, MetadataStore, WriteReleaseMode};
use dev_pipeline::{spawn, InProcessScheduler, PipelineHandle, PipelineResources, StaticSourceProvider};
use dev_pixelcache::{PixelCache, RasterMaskChannel};
use dev_types::{DevelopError, DevelopResult, DistortDirection, ImageId, PipelineType, Point};
use dev_undo::UndoLedger;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Per-pipeline running sample counts the GUI renders as a luminance
/// histogram. Scope is deliberately thin: computing the actual bucket
/// values is an operator concern, out of this crate's reach.
#[derive(Debug, Clone, Default)]
pub struct HistogramBuffers {
    pub main: Vec<u32>,
    pub preview: Vec<u32>,
}

impl HistogramBuffers {
    fn zeroed(bins: usize) -> Self {
        Self {
            main: vec![0; bins],
            preview: vec![0; bins],
        }
    }
}

/// Collaborators the controller needs handed in at construction (spec §6
/// "external interfaces"): the relational store, the sidecar store, the
/// closed operator set, and the full-resolution decoder stub.
pub struct EngineDeps {
    pub store: Arc<dyn MetadataStore>,
    pub history_sidecar: Arc<dyn HistorySidecarStore>,
    pub registry: Arc<OperatorRegistry>,
    pub loader: Arc<dyn SourceLoader>,
    pub config: EngineConfig,
    pub device_ppd: f64,
}

impl EngineDeps {
    /// A ready-to-use set of collaborators for tests and the CLI demo:
    /// an in-memory store, the filesystem history sidecar, and the
    /// synthetic decoder (spec §1's decoder Non-goal).
    pub fn with_store(store: Arc<dyn MetadataStore>, registry: Arc<OperatorRegistry>) -> Self {
        Self {
            store,
            history_sidecar: Arc::new(crate::history_store::FsHistorySidecarStore),
            registry,
            loader: Arc::new(crate::source_loader::SyntheticLoader),
            config: EngineConfig::default(),
            device_ppd: 1.0,
        }
    }
}

/// The Develop Controller (spec §4.F).
pub struct Engine {
    config: EngineConfig,
    metadata_cache: MetadataCache,
    pixel_cache: Arc<PixelCache>,
    masks: RasterMaskChannel,
    event_bus: EventBus,
    undo: UndoLedger,
    registry: Arc<OperatorRegistry>,
    history: Arc<RwLock<dev_graph::History>>,
    modules: ModuleStack,
    roi: RoiDescriptor,
    active_module: Option<String>,
    hooks: ProxyHooks,
    main: PipelineHandle,
    preview: PipelineHandle,
    source: Arc<StaticSourceProvider>,
    loader: Arc<dyn SourceLoader>,
    history_sidecar: Arc<dyn HistorySidecarStore>,
    exit: Arc<AtomicBool>,
    current_image: ImageId,
    device_ppd: f64,
    histograms: HistogramBuffers,
    attached_to_gui: bool,
}

impl Engine {
    /// Wires up both executors and the shared collaborators. Mirrors the
    /// construction half of spec §4.F `init`; the `init` operation itself
    /// (below) handles the reset-to-defaults + `develop-initialize` signal.
    pub fn new(deps: EngineDeps) -> Self {
        let capacity = deps.config.file.cache.metadata_entries;
        let pixel_bytes = deps.config.file.cache.pixel_cache_bytes;

        let metadata_cache = MetadataCache::new(deps.store.clone(), None, capacity);
        let pixel_cache = Arc::new(PixelCache::new(pixel_bytes));
        let event_bus = EventBus::new();
        let history = Arc::new(RwLock::new(dev_graph::History::new()));
        let source = Arc::new(StaticSourceProvider::new());
        let exit = Arc::new(AtomicBool::new(false));
        let pipeline_threadsafe = Arc::new(Mutex::new(()));
        let masks = RasterMaskChannel::new();
        let scheduler: Arc<dyn dev_pipeline::TileScheduler> = Arc::new(InProcessScheduler);

        let main_resources = Arc::new(PipelineResources {
            image_id: Mutex::new(ImageId::UNKNOWN),
            pipeline_type: PipelineType::Full,
            history: history.clone(),
            registry: deps.registry.clone(),
            pixel_cache: pixel_cache.clone(),
            source: source.clone(),
            event_bus: event_bus.clone(),
            requested_roi: Mutex::new(dev_types::Roi::full(1, 1, 1.0)),
            pipeline_threadsafe: pipeline_threadsafe.clone(),
            masks: masks.clone(),
            scheduler: scheduler.clone(),
        });
        let preview_resources = Arc::new(PipelineResources {
            image_id: Mutex::new(ImageId::UNKNOWN),
            pipeline_type: PipelineType::Preview,
            history: history.clone(),
            registry: deps.registry.clone(),
            pixel_cache: pixel_cache.clone(),
            source: source.clone(),
            event_bus: event_bus.clone(),
            requested_roi: Mutex::new(dev_types::Roi::full(1, 1, 1.0)),
            pipeline_threadsafe,
            masks: masks.clone(),
            scheduler,
        });

        let main = spawn(main_resources, deps.config.file.timing, exit.clone());
        let preview = spawn(preview_resources, deps.config.file.timing, exit.clone());

        Self {
            config: deps.config,
            metadata_cache,
            pixel_cache,
            masks,
            event_bus,
            undo: UndoLedger::new(),
            registry: deps.registry,
            history,
            modules: ModuleStack::new(),
            roi: RoiDescriptor::default(),
            active_module: None,
            hooks: ProxyHooks::default(),
            main,
            preview,
            source,
            loader: deps.loader,
            history_sidecar: deps.history_sidecar,
            exit,
            current_image: ImageId::UNKNOWN,
            device_ppd: deps.device_ppd,
            histograms: HistogramBuffers::default(),
            attached_to_gui: false,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn metadata_cache(&self) -> &MetadataCache {
        &self.metadata_cache
    }

    pub fn pixel_cache(&self) -> &PixelCache {
        &self.pixel_cache
    }

    pub fn masks(&self) -> &RasterMaskChannel {
        &self.masks
    }

    pub fn undo_mut(&mut self) -> &mut UndoLedger {
        &mut self.undo
    }

    pub fn hooks_mut(&mut self) -> &mut ProxyHooks {
        &mut self.hooks
    }

    pub fn modules(&self) -> &[ModuleInstance] {
        self.modules.instances()
    }

    pub fn roi(&self) -> RoiDescriptor {
        self.roi
    }

    /// Read access to the edit history, for diagnostics and tests that need
    /// to inspect `active()`/`full()`/`history_end` directly.
    pub fn history(&self) -> std::sync::RwLockReadGuard<'_, dev_graph::History> {
        self.history.read().expect("history rwlock poisoned")
    }

    pub fn main(&self) -> &PipelineHandle {
        &self.main
    }

    pub fn preview(&self) -> &PipelineHandle {
        &self.preview
    }

    pub fn set_active_module(&mut self, operator: Option<String>) {
        self.active_module = operator;
    }

    /// Resets to post-construction defaults and announces readiness (spec
    /// §4.F `init(attached_to_gui)`).
    pub fn init(&mut self, attached_to_gui: bool) {
        self.attached_to_gui = attached_to_gui;
        self.roi = RoiDescriptor::default();
        self.masks.clear();
        self.histograms = HistogramBuffers::zeroed(256);
        self.event_bus.publish(Signal::DevelopInitialize);
        info!(target: "controller", attached_to_gui, "engine_initialized");
    }

    /// Spec §4.F `load_image`: loads the source buffer, snapshots the
    /// record, instantiates modules from the registry, reads history from
    /// the sidecar (falling back to an empty history on first import), then
    /// `rebuild_all`s both pipelines.
    pub fn load_image(&mut self, id: ImageId) -> DevelopResult<()> {
        let handle = self.metadata_cache.get(id, MetaLockMode::Read);
        let record = (*handle).clone();
        handle.release(WriteReleaseMode::Minimal)?;

        let buffer = self.loader.load(&record)?;
        self.source.set(id, buffer.clone());

        self.modules.instantiate_from_registry(&self.registry);

        let loaded_history = if self.history_sidecar.exists(&record.fullpath) {
            self.history_sidecar
                .load(id, &record.fullpath)
                .and_then(|text| history_sidecar::from_toml(&text).ok())
        } else {
            None
        };

        {
            let mut history = self.history.write().expect("history rwlock poisoned");
            *history = loaded_history.unwrap_or_default();
        }

        self.current_image = id;
        self.main.set_image(id);
        self.preview.set_image(id);
        self.roi
            .recompute_natural_scale(buffer.width as f64, buffer.height as f64, self.device_ppd, PipelineType::Full);
        self.roi.clamp_zoom(self.config.file.zoom, self.device_ppd);

        self.event_bus.publish(Signal::DevelopImageChanged(id));
        self.rebuild_all(buffer.width, buffer.height);
        debug!(target: "controller", id = ?id, "image_loaded");
        Ok(())
    }

    fn rebuild_all(&self, processed_w: u32, processed_h: u32) {
        let roi = self.roi.to_roi(processed_w, processed_h);
        self.main.set_requested_roi(roi);
        self.preview.set_requested_roi(roi);
        self.resync_all();
    }

    /// Spec §5: delay the main pipeline by 150ms so the preview pipeline
    /// gets a chance to finish first, then kick both pipelines DIRTY.
    pub fn process_all(&self) {
        self.main.set_timeout_micros(self.config.file.timing.preview_head_start_ms * 1_000);
        self.main.update();
        self.preview.update();
    }

    pub fn update_main(&self) {
        self.main.update();
    }

    pub fn update_preview(&self) {
        self.preview.update();
    }

    pub fn update_all(&self) {
        self.update_main();
        self.update_preview();
    }

    pub fn resync_main(&self) {
        self.main.resync();
    }

    pub fn resync_preview(&self) {
        self.preview.resync();
    }

    pub fn resync_all(&self) {
        self.resync_main();
        self.resync_preview();
    }

    pub fn change_zoom_main(&mut self, zoom_scale: f64) {
        self.roi.zoom_scale = zoom_scale;
        self.roi.clamp_zoom(self.config.file.zoom, self.device_ppd);
        self.main.change_zoom(self.roi.to_roi(self.roi.viewport_w as u32, self.roi.viewport_h as u32));
    }

    pub fn change_zoom_preview(&mut self, zoom_scale: f64) {
        self.roi.zoom_scale = zoom_scale;
        self.roi.clamp_zoom(self.config.file.zoom, self.device_ppd);
        self.preview.change_zoom(self.roi.to_roi(self.roi.viewport_w as u32, self.roi.viewport_h as u32));
    }

    pub fn change_zoom_all(&mut self, zoom_scale: f64) {
        self.roi.zoom_scale = zoom_scale;
        self.roi.clamp_zoom(self.config.file.zoom, self.device_ppd);
        let roi = self.roi.to_roi(self.roi.viewport_w as u32, self.roi.viewport_h as u32);
        self.main.change_zoom(roi);
        self.preview.change_zoom(roi);
    }

    /// Spec §4.F `reset_all`: flush pixel caches and force a full recompute.
    pub fn reset_all(&self) {
        self.pixel_cache.flush(PipelineType::Full);
        self.pixel_cache.flush(PipelineType::Preview);
        self.masks.clear();
        self.resync_all();
    }

    /// Spec §4.F `refresh_{main,preview}(full)`: queue + force.
    pub fn refresh_main(&self, full: bool) {
        if full {
            self.main.resync();
        } else {
            self.main.update();
        }
    }

    pub fn refresh_preview(&self, full: bool) {
        if full {
            self.preview.resync();
        } else {
            self.preview.update();
        }
    }

    /// Appends a committed parameter change to the history (spec §4.F
    /// "mutators ... history append", operator contract's `commit_params`):
    /// validates/normalizes `params` through the operator, truncates any
    /// scrubbed redo tail, pushes the new item, then resyncs both
    /// pipelines (`history_hash` changing is the sole resync trigger).
    pub fn commit_module(&mut self, operator: &str, mut params: Vec<u8>) -> DevelopResult<()> {
        let op = self.registry.resolve(operator)?;
        let mut blend_params = Vec::new();
        op.commit_params(&mut params, &mut blend_params);

        let iop_order = self
            .modules
            .instances()
            .iter()
            .find(|m| m.operator == operator)
            .map(|m| m.iop_order)
            .unwrap_or(0.0);

        {
            let mut history = self.history.write().expect("history rwlock poisoned");
            history.append(dev_graph::HistoryItem {
                operator: operator.to_string(),
                multi_priority: 0,
                multi_name: String::new(),
                iop_order,
                enabled: true,
                params,
                blend_params,
            });
        }
        self.update_all();
        Ok(())
    }

    /// Spec §4.F "Module duplication": assigns the new instance its
    /// `multi_priority`/`multi_name`, then appends the matching history
    /// item so the pipelines actually pick up the duplicate (spec §8 S3).
    pub fn duplicate_module(&mut self, operator: &str) -> ModuleInstance {
        let base_order = self
            .modules
            .instances()
            .iter()
            .filter(|m| m.operator == operator)
            .map(|m| m.iop_order)
            .fold(0.0_f64, f64::max);
        let instance = self.modules.duplicate(operator, base_order + 0.001);

        let params = self.registry.get(operator).map(|op| op.default_params()).unwrap_or_default();
        {
            let mut history = self.history.write().expect("history rwlock poisoned");
            history.append(dev_graph::HistoryItem {
                operator: instance.operator.clone(),
                multi_priority: instance.multi_priority,
                multi_name: instance.multi_name.clone(),
                iop_order: instance.iop_order,
                enabled: instance.enabled,
                params,
                blend_params: Vec::new(),
            });
        }

        self.hooks.notify_instance_inserted(&instance);
        self.update_all();
        instance
    }

    pub fn can_move_before(&self, a: &ModuleInstance, b: &ModuleInstance) -> bool {
        self.modules.can_move_before(&self.registry, a, b)
    }

    pub fn can_move_after(&self, a: &ModuleInstance, b: &ModuleInstance) -> bool {
        self.modules.can_move_after(&self.registry, a, b)
    }

    /// Spec §4.F "Module removal": under the history write lock, deletes
    /// every item referencing `operator`, removes it from the module stack,
    /// and signals removal.
    pub fn remove_module(&mut self, operator: &str) {
        {
            let mut history = self.history.write().expect("history rwlock poisoned");
            history.remove_operator(operator);
        }
        self.modules.remove_operator(operator);
        self.event_bus.publish(Signal::DevelopModuleRemove {
            operator: operator.to_string(),
        });
        self.resync_all();
    }

    /// Spec §4.F "Coordinate transforms": chains inverse distortion through
    /// all enabled pieces in the main pipeline's current graph back to the
    /// input raster.
    pub fn roi_to_input_space(&self, p: Point) -> Point {
        self.main.distort_point(p, DistortDirection::Backward, self.active_module.as_deref())
    }

    pub fn roi_delta_to_input_space(&self, d: Point, center: Point) -> Point {
        let tip = Point {
            x: center.x + d.x,
            y: center.y + d.y,
        };
        let a = self.roi_to_input_space(center);
        let b = self.roi_to_input_space(tip);
        Point { x: b.x - a.x, y: b.y - a.y }
    }

    /// Persists the current history to the image's sidecar, used by the
    /// snapshot-request hook and the CLI demo's explicit "save" step.
    pub fn save_sidecar(&self) -> DevelopResult<()> {
        let handle = self.metadata_cache.get(self.current_image, MetaLockMode::Read);
        let fullpath = handle.fullpath.clone();
        handle.release(WriteReleaseMode::Minimal)?;

        let history = self.history.read().expect("history rwlock poisoned");
        let blob = history_sidecar::to_toml(&history).map_err(|e| DevelopError::PersistenceFailure {
            image_id: self.current_image.0,
            message: e.to_string(),
        })?;
        self.history_sidecar
            .save(self.current_image, &fullpath, &blob)
            .map_err(|e| DevelopError::PersistenceFailure {
                image_id: self.current_image.0,
                message: e.to_string(),
            })
    }

    pub fn histograms(&self) -> &HistogramBuffers {
        &self.histograms
    }

    pub fn shutdown(&mut self) {
        self.exit.store(true, std::sync::atomic::Ordering::Release);
        self.main.shutdown_and_join();
        self.preview.shutdown_and_join();
    }
}
