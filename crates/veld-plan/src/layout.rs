//! Operand positions per operator kind.
//!
//! Physical kinds reuse the layout of their logical counterpart:
//! `FusedIo` reads like `Read` (with the partition operand resolved),
//! `BlockwiseFilter` like `Filter`, `BlockwiseProject` like `Project`,
//! `BlockwiseMerge`/`HashJoinP2P` like `Merge`, `HashAggregate` like
//! `Aggregate`.

pub mod read {
    pub const PATH: usize = 0;
    pub const COLUMNS: usize = 1;
    /// `UInt` partition count, or `None` until tuning/lowering resolves it.
    pub const PARTITIONS: usize = 2;
}

pub mod filter {
    pub const INPUT: usize = 0;
    pub const PREDICATE: usize = 1;
}

pub mod project {
    pub const INPUT: usize = 0;
    pub const COLUMNS: usize = 1;
}

pub mod merge {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const ON: usize = 2;
    /// `UInt` output partition count; `None` until tuned.
    pub const OUTPUT_PARTITIONS: usize = 3;
}

pub mod aggregate {
    pub const INPUT: usize = 0;
    pub const GROUP_BY: usize = 1;
    pub const AGGS: usize = 2;
    /// `UInt` output partition count; `None` until tuned.
    pub const OUTPUT_PARTITIONS: usize = 3;
}

pub mod fused {
    pub const ROOT: usize = 0;
    /// JSON array of member node names; membership must survive interning.
    pub const MEMBERS: usize = 1;
}

pub mod opaque {
    pub const GRAPH: usize = 0;
}
