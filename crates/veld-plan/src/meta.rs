//! Client-side metadata resolution, consumed during lowering.
//!
//! Resolution is synchronous and blocking from the optimizer's point of
//! view: a read's partition count must be fixed before its lowering result
//! is final. Failures surface to the caller (lowering attaches the node
//! they broke); retry policy belongs to the metadata source, never to
//! this core.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use veld_core::prelude::{Error, Result};

/// Partitioning/statistics metadata for an I/O source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub partition_count: u64,
    pub row_estimate: Option<u64>,
}

/// External collaborator interface: given an I/O-like node's source path,
/// return its partition statistics. Client-side only; never delegated to
/// the executor.
pub trait MetadataResolver: Send + Sync {
    fn partition_stats(&self, path: &str) -> Result<PartitionStats>;
}

/// In-memory resolver backed by a fixed table. Useful for tests and for
/// clients that precompute statistics.
#[derive(Debug, Default, Clone)]
pub struct FixedResolver {
    table: BTreeMap<String, PartitionStats>,
}

impl FixedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, stats: PartitionStats) -> Self {
        self.table.insert(path.to_string(), stats);
        self
    }
}

impl MetadataResolver for FixedResolver {
    fn partition_stats(&self, path: &str) -> Result<PartitionStats> {
        self.table
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("no statistics for source '{}'", path)))
    }
}
