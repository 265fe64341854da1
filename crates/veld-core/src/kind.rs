//! Operator kinds and their static classification.
//!
//! Per-kind *behavior* (rewrite rules, lowering strategies, property
//! derivations) lives in the plan and optimizer crates; this enum only
//! answers structural questions the core model needs: name prefix,
//! singleton enforcement, logical/physical split, fusability, and which
//! derived-cache entries survive serialization.

use serde::{Deserialize, Serialize};

use crate::cache::keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    // Logical operators
    Read,
    Filter,
    Project,
    Merge,
    Aggregate,
    // Physical operators
    FusedIo,
    BlockwiseFilter,
    BlockwiseProject,
    BlockwiseMerge,
    HashJoinP2P,
    HashAggregate,
    Fused,
    // Adapter for opaque precomputed graphs
    Opaque,
}

impl OpKind {
    /// Name prefix; a node's name is `"{prefix}-{token.short()}"`.
    pub fn prefix(&self) -> &'static str {
        match self {
            OpKind::Read => "read",
            OpKind::Filter => "filter",
            OpKind::Project => "project",
            OpKind::Merge => "merge",
            OpKind::Aggregate => "aggregate",
            OpKind::FusedIo => "fusedio",
            OpKind::BlockwiseFilter => "blockwisefilter",
            OpKind::BlockwiseProject => "blockwiseproject",
            OpKind::BlockwiseMerge => "blockwisemerge",
            OpKind::HashJoinP2P => "hashjoinp2p",
            OpKind::HashAggregate => "hashaggregate",
            OpKind::Fused => "fused",
            OpKind::Opaque => "opaque",
        }
    }

    /// Equal tokens must map to the same shared instance for singleton
    /// kinds. Opaque wrappers are exempt: identity of the wrapped foreign
    /// payload matters beyond structural equality.
    pub fn is_singleton(&self) -> bool {
        !matches!(self, OpKind::Opaque)
    }

    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            OpKind::Read | OpKind::Filter | OpKind::Project | OpKind::Merge | OpKind::Aggregate
        )
    }

    pub fn is_physical(&self) -> bool {
        !self.is_logical()
    }

    /// Kinds eligible for linear-chain fusion. Shuffle-like operators and
    /// already-fused containers act as barriers.
    pub fn is_blockwise(&self) -> bool {
        matches!(
            self,
            OpKind::FusedIo
                | OpKind::BlockwiseFilter
                | OpKind::BlockwiseProject
                | OpKind::BlockwiseMerge
        )
    }

    /// Whether a derived-cache entry under `key` survives serialization.
    /// Source statistics must be re-resolved per process; opaque wrappers
    /// persist nothing.
    pub fn persists_cache_key(&self, key: &str) -> bool {
        match self {
            OpKind::Opaque => false,
            OpKind::Read | OpKind::FusedIo => key != keys::SOURCE_STATS,
            _ => true,
        }
    }
}
