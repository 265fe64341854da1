//! Task-graph types handed to the external executor, and the interface an
//! opaque legacy graph must expose to participate in a plan.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task keys are derived from node names.
pub type TaskKey = String;

/// One executable unit: a computation description plus the task keys it
/// depends on. The executor already understands this form; what `spec`
/// means to a worker is out of scope here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub spec: Value,
    pub deps: Vec<TaskKey>,
}

/// Deterministically ordered task mapping.
pub type TaskGraph = BTreeMap<TaskKey, Task>;

/// An externally supplied, already-opaque computation graph.
///
/// Implementations own any legacy-graph-specific optimization; `to_tasks`
/// is expected to apply it before producing tasks. Conversion is deferred
/// until an executor asks for materialization, and the adapter in
/// `veld-exec` guarantees it runs at most once per wrapped graph.
pub trait LegacyGraph: fmt::Debug + Send + Sync {
    /// Stable bytes identifying the wrapped graph; feeds the structural
    /// token of the wrapping node.
    fn fingerprint(&self) -> Vec<u8>;

    /// Task key under which the legacy graph exposes its final output.
    fn output_key(&self) -> TaskKey;

    /// Convert the wrapped graph into executor tasks.
    fn to_tasks(&self) -> TaskGraph;
}
