//! The append-only edit history (spec §3 "History"). `history_end` marks the
//! active tail so undo-scrubbing can "forget" the suffix without truncating
//! it outright.

use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// One committed edit: a module identity plus a full params+blend snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryItem {
    pub operator: String,
    pub multi_priority: i32,
    pub multi_name: String,
    pub iop_order: f64,
    pub enabled: bool,
    pub params: Vec<u8>,
    pub blend_params: Vec<u8>,
}

/// The append-only history list plus its active-prefix marker and summary
/// hash (spec §3).
#[derive(Clone, Debug, Default)]
pub struct History {
    items: Vec<HistoryItem>,
    pub history_end: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, item: HistoryItem) {
        self.items.truncate(self.history_end);
        self.items.push(item);
        self.history_end = self.items.len();
    }

    pub fn active(&self) -> &[HistoryItem] {
        &self.items[..self.history_end]
    }

    pub fn full(&self) -> &[HistoryItem] {
        &self.items
    }

    /// Summarizes the active prefix; its mutation is the single trigger for
    /// pipeline resynchronization (spec §3).
    pub fn history_hash(&self) -> u64 {
        let mut hasher = AHasher::default();
        for item in self.active() {
            item.operator.hash(&mut hasher);
            item.multi_priority.hash(&mut hasher);
            item.multi_name.hash(&mut hasher);
            item.iop_order.to_bits().hash(&mut hasher);
            item.enabled.hash(&mut hasher);
            item.params.hash(&mut hasher);
            item.blend_params.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Remove every item referencing `operator` (module removal, spec §4.F),
    /// adjusting `history_end` to stay within bounds.
    pub fn remove_operator(&mut self, operator: &str) {
        let before = self.items.len();
        self.items.retain(|item| item.operator != operator);
        let removed = before - self.items.len();
        self.history_end = self.history_end.saturating_sub(removed).min(self.items.len());
    }
}
