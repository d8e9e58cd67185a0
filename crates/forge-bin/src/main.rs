//! `forge`: a CLI harness that drives the develop engine end to end —
//! seed a record, load it, apply a small demo history, run both pipelines
//! to convergence, and report status. Exists to exercise `dev-controller`
//! outside a GUI; the engine itself doesn't know this binary exists.

mod operators;

use anyhow::{Context, Result};
use clap::Parser;
use dev_controller::{Engine, EngineDeps};
use dev_graph::OperatorRegistry;
use dev_metacache::{LockMode, MemoryStore, MetadataStore};
use dev_types::ImageId;
use operators::{Exposure, Watermark};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "forge", version, about = "Develop engine CLI harness")]
struct Args {
    /// Raw file to pretend to load (only its path/size matter; decoding is
    /// out of scope, so a synthetic mid-gray buffer stands in).
    path: PathBuf,

    /// Optional path to `develop.toml` (overrides discovery).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Exposure compensation in stops to append to the demo history.
    #[arg(long = "exposure", default_value_t = 0.0)]
    exposure: f32,

    /// Append the watermark module to the demo history.
    #[arg(long = "watermark")]
    watermark: bool,

    /// Seconds to wait for both pipelines to reach a terminal status
    /// before giving up and reporting whatever state they're in.
    #[arg(long = "timeout-secs", default_value_t = 5)]
    timeout_secs: u64,
}

fn configure_logging() -> Result<WorkerGuard> {
    let log_dir = Path::new(".");
    let file_appender = tracing_appender::rolling::never(log_dir, "forge.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;
    Ok(guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn build_registry() -> Arc<OperatorRegistry> {
    let mut registry = OperatorRegistry::new();
    registry.register(Arc::new(Exposure));
    registry.register(Arc::new(Watermark));
    Arc::new(registry)
}

fn seed_record(store: &MemoryStore, id: ImageId, path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    let mut record = dev_types::ImageRecord::new_unknown(id);
    record.filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("untitled").to_string();
    record.fullpath = path.to_str().context("path is not valid UTF-8")?.to_string();
    // A real decoder would read the actual raster dimensions; this demo
    // derives a placeholder size from the file's byte length so different
    // inputs still produce visibly different buffers.
    let dim = (32 + (metadata.len() % 480)) as u32;
    record.width = dim;
    record.height = dim;
    store.save(&record)?;
    Ok(())
}

fn wait_for_valid(engine: &Engine, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        let main = engine.main().status();
        let preview = engine.preview().status();
        let done = |s: dev_pipeline::PipelineStatus| {
            matches!(s, dev_pipeline::PipelineStatus::Valid | dev_pipeline::PipelineStatus::Invalid)
        };
        if done(main) && done(preview) {
            break;
        }
        if Instant::now() >= deadline {
            warn!(target: "forge", ?main, ?preview, "timed_out_waiting_for_pipelines");
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn main() -> Result<()> {
    let _log_guard = configure_logging()?;
    install_panic_hook();

    let args = Args::parse();
    info!(target: "forge", path = %args.path.display(), "startup");

    let config = dev_config::load_from(args.config.clone())?;
    let registry = build_registry();
    let store = Arc::new(MemoryStore::new());
    let id = ImageId(1);
    seed_record(&store, id, &args.path)?;

    let mut deps = EngineDeps::with_store(store, registry);
    deps.config = config;

    let mut engine = Engine::new(deps);
    engine.init(false);
    engine.load_image(id).context("load_image failed")?;

    if args.exposure != 0.0 {
        engine.commit_module("exposure", args.exposure.to_le_bytes().to_vec())?;
    }
    if args.watermark {
        engine.commit_module("watermark", Vec::new())?;
    }

    engine.process_all();
    wait_for_valid(&engine, Duration::from_secs(args.timeout_secs));

    let record = engine.metadata_cache().get(id, LockMode::Read);
    println!("loaded {} ({}x{})", record.filename, record.width, record.height);
    drop(record);
    println!("main pipeline:    {:?}", engine.main().status());
    println!("preview pipeline: {:?}", engine.preview().status());
    println!("modules:          {}", engine.modules().len());

    engine.save_sidecar().context("save_sidecar failed")?;
    info!(target: "forge", "sidecar_saved");

    engine.shutdown();
    Ok(())
}
