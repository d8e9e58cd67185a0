//! The Develop Controller (spec §4.F): the engine-facing aggregate that
//! owns the metadata cache, pixel cache, mask channel, event bus, undo
//! ledger, module stack, ROI state, and both pipeline executors behind one
//! `&Engine`/`&mut Engine` API.

mod engine;
mod history_sidecar;
mod history_store;
mod hooks;
mod modules;
mod roi_state;
mod source_loader;

pub use engine::{Engine, EngineDeps, HistogramBuffers};
pub use history_store::{history_path, FsHistorySidecarStore, HistorySidecarStore};
pub use hooks::{InstanceInsertedHook, MaskListChangedHook, ProxyHooks, SnapshotRequestHook, VisibilityHook};
pub use modules::{ModuleInstance, ModuleStack};
pub use roi_state::RoiDescriptor;
pub use source_loader::{SourceLoader, SyntheticLoader};

#[cfg(test)]
mod tests {
    use super::*;
    use dev_graph::{Buffer, ModuleFlags, Operator, OperatorOutcome, OperatorRegistry, ProcessArgs};
    use dev_metacache::{MemoryStore, MetadataStore};
    use dev_types::{DistortDirection, ImageId, Point};
    use std::sync::Arc;
    use std::time::Duration;

    struct Exposure;

    impl Operator for Exposure {
        fn name(&self) -> &str {
            "exposure"
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
            let gain = args.params.try_into().map(f32::from_le_bytes).unwrap_or(0.0);
            output.width = args.input.width;
            output.height = args.input.height;
            output.channels = args.input.channels;
            output.data = args.input.data.iter().map(|v| (v + gain).clamp(0.0, 1.0)).collect();
            OperatorOutcome::Done
        }
    }

    fn seeded_engine(tmp: &std::path::Path) -> (Engine, ImageId) {
        let mut registry = OperatorRegistry::new();
        registry.register(Arc::new(Exposure));

        let store = Arc::new(MemoryStore::new());
        let id = ImageId(7);
        let raw_path = tmp.join("IMG_0007.CR2");
        std::fs::write(&raw_path, b"not a real raw file").unwrap();

        let mut record = dev_types::ImageRecord::new_unknown(id);
        record.filename = "IMG_0007.CR2".to_string();
        record.fullpath = raw_path.to_str().unwrap().to_string();
        record.width = 32;
        record.height = 32;
        store.save(&record).unwrap();

        let deps = EngineDeps::with_store(store, Arc::new(registry));
        (Engine::new(deps), id)
    }

    #[test]
    fn load_image_instantiates_modules_and_processes_to_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut engine, id) = seeded_engine(tmp.path());

        engine.init(true);
        engine.load_image(id).unwrap();
        assert!(!engine.modules().is_empty());

        engine.process_all();

        let mut status = engine.main().status();
        for _ in 0..300 {
            if status == dev_pipeline::PipelineStatus::Valid {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
            status = engine.main().status();
        }
        assert_eq!(status, dev_pipeline::PipelineStatus::Valid);

        engine.shutdown();
    }

    #[test]
    fn save_and_reload_sidecar_round_trips_history() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut engine, id) = seeded_engine(tmp.path());
        engine.init(false);
        engine.load_image(id).unwrap();

        let instance = engine.duplicate_module("exposure");
        assert_eq!(instance.multi_priority, 1);

        engine.save_sidecar().unwrap();

        let registry = {
            let mut r = OperatorRegistry::new();
            r.register(Arc::new(Exposure));
            Arc::new(r)
        };
        let store = Arc::new(MemoryStore::new());
        let mut record = dev_types::ImageRecord::new_unknown(id);
        record.filename = "IMG_0007.CR2".to_string();
        record.fullpath = engine.metadata_cache().get(id, dev_metacache::LockMode::Read).fullpath.clone();
        record.width = 32;
        record.height = 32;
        store.save(&record).unwrap();
        let deps = EngineDeps::with_store(store, registry);
        let mut reloaded = Engine::new(deps);
        reloaded.init(false);
        reloaded.load_image(id).unwrap();

        engine.shutdown();
        reloaded.shutdown();
    }

    #[test]
    fn commit_module_appends_history_and_converges_to_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut engine, id) = seeded_engine(tmp.path());
        engine.init(true);
        engine.load_image(id).unwrap();

        engine.commit_module("exposure", 0.1_f32.to_le_bytes().to_vec()).unwrap();

        let mut status = engine.main().status();
        for _ in 0..300 {
            if status == dev_pipeline::PipelineStatus::Valid {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
            status = engine.main().status();
        }
        assert_eq!(status, dev_pipeline::PipelineStatus::Valid);
        let backbuf = engine.main().backbuf().expect("backbuf should be populated");
        assert!(backbuf.data.iter().all(|&v| (v - 0.6).abs() < 1e-6));

        engine.shutdown();
    }

    #[test]
    fn reset_all_flushes_caches_and_masks() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut engine, id) = seeded_engine(tmp.path());
        engine.init(true);
        engine.load_image(id).unwrap();
        engine.reset_all();
        engine.shutdown();
    }
}
