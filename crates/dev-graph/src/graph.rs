//! [`PipelineGraph`]: builds and maintains the piece list for one pipeline
//! from the active history prefix (spec §4.C).

use crate::history::History;
use crate::piece::Piece;
use dev_types::GlobalHash;
use tracing::trace;

/// The change set an executor commits against before choosing how to
/// resynchronize (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSet {
    /// A new item was appended or an existing top item's params changed.
    TopChanged,
    /// A module instance was removed from the stack.
    Remove,
    /// Miscellaneous full resync (undo/redo, module add/reorder).
    Synch,
    /// Viewport/zoom changed; no history resync needed.
    Zoomed,
}

/// The ordered piece list for one pipeline (spec §4.C, §3 "Pipeline").
#[derive(Debug, Default)]
pub struct PipelineGraph {
    pieces: Vec<Piece>,
    last_history_hash: u64,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn pieces_mut(&mut self) -> &mut [Piece] {
        &mut self.pieces
    }

    pub fn last_history_hash(&self) -> u64 {
        self.last_history_hash
    }

    /// Full rebuild: clear nodes, recreate one piece per active module in
    /// `iop_order`, ascending (spec §4.C).
    pub fn rebuild_full(&mut self, history: &History) {
        self.pieces.clear();
        let mut items: Vec<_> = history.active().iter().collect();
        items.sort_by(|a, b| a.iop_order.partial_cmp(&b.iop_order).unwrap());
        for item in items {
            if item.enabled {
                self.pieces.push(Piece::from_history_item(item));
            }
        }
        self.last_history_hash = history.history_hash();
        trace!(target: "graph", pieces = self.pieces.len(), "full_rebuild");
    }

    /// Incremental resync: walk the history tail added since
    /// `last_history_hash` and update only the corresponding pieces' params
    /// and enabled/blend state, without reordering or recreating the list
    /// (spec §4.C). Falls back to a full rebuild if the active set of
    /// enabled operators changed (an item was enabled/disabled or removed),
    /// since the piece list's membership itself would be stale otherwise.
    pub fn resync_incremental(&mut self, history: &History) {
        if history.history_hash() == self.last_history_hash {
            return;
        }
        let active_enabled: Vec<_> = history.active().iter().filter(|i| i.enabled).collect();
        if active_enabled.len() != self.pieces.len() {
            self.rebuild_full(history);
            return;
        }
        let mut items_by_order: Vec<_> = active_enabled;
        items_by_order.sort_by(|a, b| a.iop_order.partial_cmp(&b.iop_order).unwrap());

        let identities_match = self
            .pieces
            .iter()
            .zip(items_by_order.iter())
            .all(|(piece, item)| piece.matches_identity(item));
        if !identities_match {
            // membership/order changed in a way the fast path can't
            // reconcile positionally; escalate.
            self.rebuild_full(history);
            return;
        }
        for (piece, item) in self.pieces.iter_mut().zip(items_by_order.iter()) {
            piece.sync_from(item);
        }
        self.last_history_hash = history.history_hash();
        trace!(target: "graph", pieces = self.pieces.len(), "incremental_resync");
    }

    /// Recomputes `params_hash` for every piece, then `global_hash`
    /// sequentially once the ROI planner has set each piece's `roi_out`
    /// (spec §4.C "Each rebuild/resync recomputes...").
    pub fn recompute_hashes(&mut self, seed: GlobalHash) {
        let mut upstream = seed;
        for piece in &mut self.pieces {
            piece.recompute_params_hash();
            piece.recompute_global_hash(upstream);
            upstream = piece.global_hash;
        }
    }
}
