//! Adapter for opaque precomputed graphs.
//!
//! A legacy graph participates in a plan as a single leaf-like node; every
//! rewrite rule treats it as a black box. Conversion into tasks is
//! deferred until the executor asks for materialization, and the adapter
//! caches the result so the wrapped graph's own conversion (which may run
//! its legacy-specific optimization) executes at most once per node.

use std::sync::{Arc, OnceLock};

use veld_core::prelude::{
    Interner, LegacyGraph, NodeRef, OpKind, Operand, Result, TaskGraph, TaskKey,
};

/// Caching wrapper installed around every graph passed to [`opaque`].
#[derive(Debug)]
pub struct LegacyAdapter {
    graph: Arc<dyn LegacyGraph>,
    tasks: OnceLock<TaskGraph>,
}

impl LegacyAdapter {
    pub fn new(graph: Arc<dyn LegacyGraph>) -> Self {
        Self {
            graph,
            tasks: OnceLock::new(),
        }
    }
}

impl LegacyGraph for LegacyAdapter {
    fn fingerprint(&self) -> Vec<u8> {
        self.graph.fingerprint()
    }

    fn output_key(&self) -> TaskKey {
        self.graph.output_key()
    }

    fn to_tasks(&self) -> TaskGraph {
        self.tasks.get_or_init(|| self.graph.to_tasks()).clone()
    }
}

/// Wrap an opaque legacy graph as a plan node. Not singleton-enforced:
/// two wrappers over byte-identical graphs stay distinct instances.
pub fn opaque(interner: &Interner, graph: Arc<dyn LegacyGraph>) -> Result<NodeRef> {
    let adapter: Arc<dyn LegacyGraph> = Arc::new(LegacyAdapter::new(graph));
    interner.construct(OpKind::Opaque, vec![Operand::Legacy(adapter)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use veld_core::prelude::Task;

    #[derive(Debug, Default)]
    struct CountingGraph {
        conversions: AtomicUsize,
    }

    impl LegacyGraph for CountingGraph {
        fn fingerprint(&self) -> Vec<u8> {
            b"counting-graph".to_vec()
        }

        fn output_key(&self) -> TaskKey {
            "legacy-out".to_string()
        }

        fn to_tasks(&self) -> TaskGraph {
            self.conversions.fetch_add(1, Ordering::SeqCst);
            let mut tasks = TaskGraph::new();
            tasks.insert(
                "legacy-out".to_string(),
                Task {
                    spec: json!({"op": "legacy"}),
                    deps: vec![],
                },
            );
            tasks
        }
    }

    #[test]
    fn test_conversion_is_cached() {
        let graph = Arc::new(CountingGraph::default());
        let adapter = LegacyAdapter::new(graph.clone());
        let t1 = adapter.to_tasks();
        let t2 = adapter.to_tasks();
        assert_eq!(t1, t2);
        assert_eq!(graph.conversions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_opaque_nodes_are_distinct_instances() {
        let it = Interner::new();
        let graph = Arc::new(CountingGraph::default());
        let n1 = opaque(&it, graph.clone()).unwrap();
        let n2 = opaque(&it, graph).unwrap();
        assert_eq!(n1.token(), n2.token());
        assert!(!Arc::ptr_eq(&n1, &n2));
    }
}
