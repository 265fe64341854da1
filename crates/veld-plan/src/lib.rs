#![forbid(unsafe_code)]
//! veld-plan: plan construction and derived plan properties.
//!
//! Builders route every node through the interner factory; the `layout`
//! module pins down operand positions per operator kind; `props` derives
//! output columns and partition counts into the per-node cache; `meta`
//! defines the client-side metadata interface lowering depends on.

pub mod access;
pub mod builders;
pub mod layout;
pub mod meta;
pub mod props;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
