//! TOML (de)serialization of a [`dev_graph::History`] for the sidecar
//! write-back path (spec §4.A "write-back", §6 "round-trip invariant").
//!
//! `dev-graph::HistoryItem` deliberately stays free of `serde` so the graph
//! crate doesn't pull in a serialization dependency it has no other use
//! for; this module owns the mirrored, serializable shape instead.

use dev_graph::{History, HistoryItem};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct HistoryItemRecord {
    operator: String,
    multi_priority: i32,
    multi_name: String,
    iop_order: f64,
    enabled: bool,
    params: Vec<u8>,
    blend_params: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct HistoryRecord {
    history_end: usize,
    items: Vec<HistoryItemRecord>,
}

/// Serializes the full (including redone-past) item list, preserving
/// `history_end` so a reload doesn't silently resurrect scrubbed redo tail
/// as active.
pub fn to_toml(history: &History) -> Result<String, toml::ser::Error> {
    let record = HistoryRecord {
        history_end: history.history_end,
        items: history
            .full()
            .iter()
            .map(|item| HistoryItemRecord {
                operator: item.operator.clone(),
                multi_priority: item.multi_priority,
                multi_name: item.multi_name.clone(),
                iop_order: item.iop_order,
                enabled: item.enabled,
                params: item.params.clone(),
                blend_params: item.blend_params.clone(),
            })
            .collect(),
    };
    toml::to_string(&record)
}

pub fn from_toml(blob: &str) -> Result<History, toml::de::Error> {
    let record: HistoryRecord = toml::from_str(blob)?;
    let mut history = History::new();
    for item in record.items {
        history.append(HistoryItem {
            operator: item.operator,
            multi_priority: item.multi_priority,
            multi_name: item.multi_name,
            iop_order: item.iop_order,
            enabled: item.enabled,
            params: item.params,
            blend_params: item.blend_params,
        });
    }
    history.history_end = record.history_end.min(history.full().len());
    Ok(history)
}
