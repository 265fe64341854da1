#![forbid(unsafe_code)]
//! veld-core: shared kernel for the veld plan optimizer.
//!
//! This crate contains only *pure* types and small helpers. There is
//! **no I/O**, **no async**, and **no execution logic** here, by design.
//!
//! Crates that use this:
//! - veld-plan: builds expression nodes and derives plan properties.
//! - veld-opt: rewrites node DAGs through staged passes.
//! - veld-exec: materializes optimized DAGs into task graphs.

pub mod cache;
pub mod error;
pub mod expr;
pub mod graph;
pub mod hash;
pub mod interner;
pub mod kind;
pub mod node;
pub mod operand;
pub mod persist;
pub mod prelude;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
