//! The develop engine's signal bus (spec §4.H).
//!
//! Typed, synchronous publish: handlers run on the publisher's thread. This
//! mirrors the teacher's `core-events` registry shape (trait object handlers
//! kept in a `Vec`, atomic telemetry counters) but drops the `tokio`
//! async-task machinery `core-events` uses for its input sources, since the
//! bus here has no asynchronous producers of its own — callers (the
//! controller thread, the two pipeline worker threads) publish directly.

use dev_types::{ImageId, PipelineType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// One of the named signals from spec §4.H.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    ImageInfoChanged(ImageId),
    DevelopImageChanged(ImageId),
    DevelopInitialize,
    DevelopHistoryWillChange,
    DevelopHistoryChanged,
    DevelopModuleRemove { operator: String },
    DevelopUiPipeFinished,
    DevelopPreviewPipeFinished(PipelineType),
    MouseOverImageChanged(ImageId),
    SelectionChanged,
    TagChanged(ImageId),
}

impl Signal {
    /// A stable discriminant used for telemetry keys and handler buckets.
    fn kind(&self) -> SignalKind {
        match self {
            Signal::ImageInfoChanged(_) => SignalKind::ImageInfoChanged,
            Signal::DevelopImageChanged(_) => SignalKind::DevelopImageChanged,
            Signal::DevelopInitialize => SignalKind::DevelopInitialize,
            Signal::DevelopHistoryWillChange => SignalKind::DevelopHistoryWillChange,
            Signal::DevelopHistoryChanged => SignalKind::DevelopHistoryChanged,
            Signal::DevelopModuleRemove { .. } => SignalKind::DevelopModuleRemove,
            Signal::DevelopUiPipeFinished => SignalKind::DevelopUiPipeFinished,
            Signal::DevelopPreviewPipeFinished(_) => SignalKind::DevelopPreviewPipeFinished,
            Signal::MouseOverImageChanged(_) => SignalKind::MouseOverImageChanged,
            Signal::SelectionChanged => SignalKind::SelectionChanged,
            Signal::TagChanged(_) => SignalKind::TagChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SignalKind {
    ImageInfoChanged,
    DevelopImageChanged,
    DevelopInitialize,
    DevelopHistoryWillChange,
    DevelopHistoryChanged,
    DevelopModuleRemove,
    DevelopUiPipeFinished,
    DevelopPreviewPipeFinished,
    MouseOverImageChanged,
    SelectionChanged,
    TagChanged,
}

const SIGNAL_KIND_COUNT: usize = 11;

fn kind_index(kind: SignalKind) -> usize {
    kind as usize
}

type Handler = Box<dyn Fn(&Signal) + Send + Sync>;

/// Telemetry: dispatch counts per signal kind (mirrors the teacher's
/// `CHANNEL_*` atomic counters in `core-events`).
#[derive(Debug, Default)]
pub struct BusMetrics {
    dispatched: [AtomicU64; SIGNAL_KIND_COUNT],
}

impl BusMetrics {
    fn record(&self, kind: SignalKind) {
        self.dispatched[kind_index(kind)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched_total(&self) -> u64 {
        self.dispatched.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

/// The synchronous publish/subscribe bus. `EventBus` is cheap to clone
/// (internally `Arc`-shared) so both the controller and the pipeline worker
/// threads can hold a handle without fighting over ownership.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<RwLock<[Vec<Handler>; SIGNAL_KIND_COUNT]>>,
    metrics: Arc<BusMetrics>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(std::array::from_fn(|_| Vec::new()))),
            metrics: Arc::new(BusMetrics::default()),
        }
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    /// Register a handler for every signal whose discriminant matches
    /// `kind_of(&signal_sample)`. Appended after any existing handlers for
    /// that kind.
    pub fn subscribe<F>(&self, sample_kind: &Signal, handler: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let mut buckets = self.inner.write().expect("event bus poisoned");
        buckets[kind_index(sample_kind.kind())].push(Box::new(handler));
    }

    /// Register a handler that must run *before* all currently-registered
    /// handlers for this signal kind. Spec §4.H mandates the info-changed
    /// metadata-reload handler be registered this way so every other
    /// handler observes fresh data.
    pub fn subscribe_first<F>(&self, sample_kind: &Signal, handler: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let mut buckets = self.inner.write().expect("event bus poisoned");
        buckets[kind_index(sample_kind.kind())].insert(0, Box::new(handler));
    }

    /// Publish a signal. Handlers run synchronously, in registration order,
    /// on the calling thread.
    pub fn publish(&self, signal: Signal) {
        self.metrics.record(signal.kind());
        let buckets = self.inner.read().expect("event bus poisoned");
        for handler in &buckets[kind_index(signal.kind())] {
            handler(&signal);
        }
        tracing::trace!(target: "events.bus", ?signal, "signal_dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        bus.subscribe(&Signal::DevelopHistoryChanged, move |_| {
            o1.lock().unwrap().push(1);
        });
        let o2 = order.clone();
        bus.subscribe(&Signal::DevelopHistoryChanged, move |_| {
            o2.lock().unwrap().push(2);
        });
        bus.publish(Signal::DevelopHistoryChanged);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn subscribe_first_runs_before_existing_handlers() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        bus.subscribe(&Signal::ImageInfoChanged(ImageId(1)), move |_| {
            o1.lock().unwrap().push("ui");
        });
        let o2 = order.clone();
        bus.subscribe_first(&Signal::ImageInfoChanged(ImageId(1)), move |_| {
            o2.lock().unwrap().push("reload");
        });
        bus.publish(Signal::ImageInfoChanged(ImageId(1)));
        assert_eq!(*order.lock().unwrap(), vec!["reload", "ui"]);
    }

    #[test]
    fn distinct_signal_kinds_do_not_cross_fire() {
        let bus = EventBus::new();
        let hit = Arc::new(Mutex::new(false));
        let h = hit.clone();
        bus.subscribe(&Signal::SelectionChanged, move |_| {
            *h.lock().unwrap() = true;
        });
        bus.publish(Signal::DevelopHistoryChanged);
        assert!(!*hit.lock().unwrap());
        bus.publish(Signal::SelectionChanged);
        assert!(*hit.lock().unwrap());
    }

    #[test]
    fn metrics_count_dispatches() {
        let bus = EventBus::new();
        bus.publish(Signal::DevelopHistoryChanged);
        bus.publish(Signal::SelectionChanged);
        assert_eq!(bus.metrics().dispatched_total(), 2);
    }
}
