use dev_controller::{Engine, EngineDeps};
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

fn seeded_engine(tmp: &std::path::Path, name: &str, id: ImageId) -> Engine {
    let mut registry = OperatorRegistry::new();
    registry.register(Arc::new(Exposure));

    let store = Arc::new(MemoryStore::new());
    let raw_path = tmp.join(name);
    std::fs::write(&raw_path, b"not a real raw file").unwrap();

    let mut record = dev_types::ImageRecord::new_unknown(id);
    record.filename = name.to_string();
    record.fullpath = raw_path.to_str().unwrap().to_string();
    record.width = 32;
    record.height = 32;
    store.save(&record).unwrap();

    let deps = EngineDeps::with_store(store, Arc::new(registry));
    Engine::new(deps)
}

fn wait_for_valid(engine: &Engine) {
    let mut status = engine.main().status();
    for _ in 0..300 {
        if status == dev_pipeline::PipelineStatus::Valid {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
        status = engine.main().status();
    }
    assert_eq!(status, dev_pipeline::PipelineStatus::Valid);
}

/// S3: duplicate an existing module. The new instance gets the next
/// `multi_priority` and a unique `multi_name`, sits immediately after the
/// base in `iop_order`, history gains one entry, and both pipelines
/// recompute.
#[test]
fn duplicate_module_gets_priority_name_and_history_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = seeded_engine(tmp.path(), "IMG_0100.CR2", ImageId(100));
    engine.init(true);
    engine.load_image(ImageId(100)).unwrap();
    engine.commit_module("exposure", 0.1_f32.to_le_bytes().to_vec()).unwrap();
    wait_for_valid(&engine);

    let before = engine.history().active().len();
    let base = engine.modules().iter().find(|m| m.operator == "exposure").unwrap().iop_order;

    let duplicate = engine.duplicate_module("exposure");
    assert_eq!(duplicate.multi_priority, 1);
    assert_ne!(duplicate.multi_name, "");
    assert!(duplicate.iop_order > base);

    let after = engine.history().active().len();
    assert_eq!(after, before + 1);

    wait_for_valid(&engine);
    engine.shutdown();
}

/// S4: changing zoom leaves the processed (full-resolution) dimensions
/// untouched and doesn't perturb the preview pipeline's own ROI.
#[test]
fn change_zoom_main_only_rescales_the_main_viewport() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = seeded_engine(tmp.path(), "IMG_0200.CR2", ImageId(200));
    engine.init(true);
    engine.load_image(ImageId(200)).unwrap();
    engine.commit_module("exposure", 0.0_f32.to_le_bytes().to_vec()).unwrap();
    wait_for_valid(&engine);

    let backbuf_before = engine.main().backbuf().expect("backbuf populated");
    assert_eq!((backbuf_before.width, backbuf_before.height), (32, 32));

    engine.change_zoom_main(2.0);
    assert_eq!(engine.roi().zoom_scale, 2.0);

    wait_for_valid(&engine);
    let backbuf_after = engine.main().backbuf().expect("backbuf populated");
    // zoom scales the ROI the pipeline is asked to fill, not the image's
    // own processed resolution.
    assert_eq!((backbuf_after.width, backbuf_after.height), (32, 32));

    engine.shutdown();
}

/// S5: removing a module deletes every history item that references it,
/// shrinks `history_end` to match, and the remaining pieces still process
/// to a valid result.
#[test]
fn remove_module_drops_matching_history_and_reprocesses() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = seeded_engine(tmp.path(), "IMG_0300.CR2", ImageId(300));
    engine.init(true);
    engine.load_image(ImageId(300)).unwrap();

    engine.commit_module("exposure", 0.1_f32.to_le_bytes().to_vec()).unwrap();
    engine.commit_module("exposure", 0.2_f32.to_le_bytes().to_vec()).unwrap();
    wait_for_valid(&engine);
    assert_eq!(engine.history().active().len(), 2);

    engine.remove_module("exposure");
    assert_eq!(engine.history().active().len(), 0);
    assert_eq!(engine.history().history_end, 0);
    assert!(engine.modules().iter().all(|m| m.operator != "exposure"));

    wait_for_valid(&engine);
    let backbuf = engine.main().backbuf().expect("backbuf populated");
    assert!(backbuf.data.iter().all(|&v| (v - 0.5).abs() < 1e-6));

    engine.shutdown();
}
