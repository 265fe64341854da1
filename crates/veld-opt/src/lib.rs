#![forbid(unsafe_code)]
//! veld-opt: graph rewriting for expression-node plans.
//!
//! The engine (`engine`) is generic over a pass's per-operator-kind rules;
//! the shipped rule sets (`rules`) implement the simplify, tune, and lower
//! stages; `fuse` collapses blockwise chains; `pipeline` sequences the
//! five stages behind a single `optimize` entry point.

pub mod engine;
pub mod fuse;
pub mod pipeline;
pub mod rules;

pub use engine::{collect_dependents, Dependents, PassContext, PassEngine, PassOutcome, RuleSet};
pub use pipeline::{lower, optimize, run_rules, simplify, tune, DivergencePolicy, PipelineConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
