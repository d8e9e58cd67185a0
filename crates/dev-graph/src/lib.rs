//! The pipeline graph and ROI planner (spec §4.C, §4.D), plus the operator
//! capability set they dispatch through (spec §6, §9).

pub mod buffer_shim;
mod graph;
mod history;
mod operator;
mod piece;
mod roi;

pub use buffer_shim::Buffer;
pub use graph::{ChangeSet, PipelineGraph};
pub use history::{History, HistoryItem};
pub use operator::{ModuleFlags, Operator, OperatorOutcome, OperatorRegistry, ProcessArgs};
pub use piece::Piece;
pub use roi::{active_disables_current, distort_transform, natural_scale, plan_roi_in, plan_roi_out};
