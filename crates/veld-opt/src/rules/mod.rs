//! Stage-specific rule sets for the rewrite pass engine.

pub mod lower;
pub mod simplify;
pub mod tune;

pub use lower::LowerRules;
pub use simplify::SimplifyRules;
pub use tune::TuneRules;

use veld_core::prelude::OpKind;

pub(crate) fn is_filter_kind(kind: OpKind) -> bool {
    matches!(kind, OpKind::Filter | OpKind::BlockwiseFilter)
}

pub(crate) fn is_project_kind(kind: OpKind) -> bool {
    matches!(kind, OpKind::Project | OpKind::BlockwiseProject)
}

pub(crate) fn is_read_kind(kind: OpKind) -> bool {
    matches!(kind, OpKind::Read | OpKind::FusedIo)
}
