#![forbid(unsafe_code)]
//! veld: content-addressed plan representation and optimization for
//! distributed dataframe computations.
//!
//! The workspace splits into four layers, re-exported here:
//! - [`veld_core`]: expression nodes, structural tokens, the interner,
//!   derived caches, and the persisted wire form.
//! - [`veld_plan`]: plan builders, operand layouts, derived properties,
//!   and the client-side metadata interface.
//! - [`veld_opt`]: the two-phase rewrite engine, the shipped rule sets,
//!   blockwise fusion, and the staged `optimize` pipeline.
//! - [`veld_exec`]: task-graph materialization and the adapter for
//!   opaque legacy graphs.

pub use veld_core;
pub use veld_exec;
pub use veld_opt;
pub use veld_plan;

/// The commonly-used surface, flattened.
pub mod prelude {
    pub use veld_core::prelude::*;
    pub use veld_exec::{materialize, opaque};
    pub use veld_opt::{optimize, PassContext, PipelineConfig};
    pub use veld_plan::builders::{aggregate, cols, filter, merge, project, read};
    pub use veld_plan::meta::{FixedResolver, MetadataResolver, PartitionStats};
    pub use veld_plan::props::{output_columns, partition_count};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
