//! [`Piece`]: one module instance's per-pipeline instantiation (spec §3
//! "PipelineOp").

use dev_types::{global_hash, params_hash, GlobalHash, MaskHash, ParamsHash, Roi};

/// One module instance inside a single pipeline's piece list.
#[derive(Clone, Debug)]
pub struct Piece {
    pub operator: String,
    pub multi_priority: i32,
    pub multi_name: String,
    pub iop_order: f64,
    pub enabled: bool,
    pub params: Vec<u8>,
    pub blend_params: Vec<u8>,

    pub roi_in: Roi,
    pub roi_out: Roi,

    pub params_hash: ParamsHash,
    pub global_hash: GlobalHash,
    pub mask_hash: Option<MaskHash>,
}

impl Piece {
    pub fn from_history_item(item: &crate::history::HistoryItem) -> Self {
        Self {
            operator: item.operator.clone(),
            multi_priority: item.multi_priority,
            multi_name: item.multi_name.clone(),
            iop_order: item.iop_order,
            enabled: item.enabled,
            params: item.params.clone(),
            blend_params: item.blend_params.clone(),
            roi_in: Roi::full(0, 0, 1.0),
            roi_out: Roi::full(0, 0, 1.0),
            params_hash: ParamsHash::default(),
            global_hash: GlobalHash::default(),
            mask_hash: None,
        }
    }

    /// Recomputes `params_hash` from this piece's current identity/params
    /// (spec §3 "params_hash"). Called on every rebuild/resync.
    pub fn recompute_params_hash(&mut self) {
        self.params_hash = params_hash(
            &self.operator,
            self.multi_priority,
            self.enabled,
            &self.params,
            &self.blend_params,
        );
    }

    /// Folds in the upstream `global_hash` once the ROI planner has set
    /// `roi_out` for this piece (spec §3 "global_hash").
    pub fn recompute_global_hash(&mut self, upstream: GlobalHash) {
        self.global_hash = global_hash(upstream, self.params_hash, &self.roi_out);
    }

    /// Syncs this piece's mutable fields from a (possibly edited) history
    /// item without disturbing identity, for incremental resync.
    pub fn sync_from(&mut self, item: &crate::history::HistoryItem) {
        self.enabled = item.enabled;
        self.params = item.params.clone();
        self.blend_params = item.blend_params.clone();
        self.iop_order = item.iop_order;
    }

    pub fn matches_identity(&self, item: &crate::history::HistoryItem) -> bool {
        self.operator == item.operator
            && self.multi_priority == item.multi_priority
            && self.multi_name == item.multi_name
    }
}
