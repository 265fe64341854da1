#![forbid(unsafe_code)]
//! veld-exec: the executor-facing edge of the plan optimizer.
//!
//! `materialize` turns an optimized node DAG into the task mapping the
//! external scheduler consumes; `legacy` adapts opaque precomputed graphs
//! so they can ride along inside a plan with deferred, once-only
//! conversion. Task *execution* lives entirely outside this workspace.

pub mod legacy;
pub mod materialize;

pub use legacy::{opaque, LegacyAdapter};
pub use materialize::materialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
