//! Node interner / singleton registry.
//!
//! `construct` is the documented factory: it tokenizes the inputs, and for
//! singleton-enforced kinds returns the live shared instance when one
//! exists, preserving its derived-property cache. Entries are weakly held,
//! so a node is collected once no DAG, registry, or pending-pass reference
//! remains; the dead weak handles left behind are swept out in amortized
//! batches whenever the registry grows past a watermark, so its size tracks
//! the live node population rather than every node ever constructed.
//!
//! The registry is process-shared, mutable state: lookups and insertions
//! are synchronized, and a lost race costs a duplicate construction while
//! the registry winner is what callers get back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::error::Result;
use crate::hash::{token_of, Token};
use crate::kind::OpKind;
use crate::node::{ExprNode, NodeRef};
use crate::operand::Operand;

/// Floor for the sweep watermark; below this the map is too small to be
/// worth scanning.
const SWEEP_MIN: usize = 64;

#[derive(Debug)]
struct Registry {
    entries: HashMap<Token, Weak<ExprNode>>,
    sweep_at: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: SWEEP_MIN,
        }
    }
}

impl Registry {
    /// Drop dead weak handles once the map reaches the watermark, then
    /// move the watermark to twice the surviving population. Each sweep is
    /// O(len) but runs at most once per len insertions, so insertion cost
    /// stays amortized O(1).
    fn maybe_sweep(&mut self) {
        if self.entries.len() < self.sweep_at {
            return;
        }
        self.entries.retain(|_, w| w.strong_count() > 0);
        self.sweep_at = SWEEP_MIN.max(self.entries.len() * 2);
    }
}

#[derive(Debug, Default)]
pub struct Interner {
    registry: Mutex<Registry>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The factory behind all plan construction: compute the token, return
    /// the existing shared node when the kind is singleton-enforced and a
    /// live entry exists, else construct and register a new node.
    pub fn construct(&self, kind: OpKind, operands: Vec<Operand>) -> Result<NodeRef> {
        let token = token_of(kind, &operands)?;

        if !kind.is_singleton() {
            return Ok(Arc::new(ExprNode::new(kind, operands, token)));
        }

        let mut registry = self.lock();
        if let Some(existing) = registry.entries.get(&token).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        let node = Arc::new(ExprNode::new(kind, operands, token));
        registry.entries.insert(token, Arc::downgrade(&node));
        registry.maybe_sweep();
        Ok(node)
    }

    /// Register a node rebuilt from its persisted form, trusting the
    /// sender's token (no recomputation). If a live singleton already holds
    /// the token, that instance is returned and the restored cache entries
    /// are merged into it.
    pub(crate) fn adopt(
        &self,
        kind: OpKind,
        operands: Vec<Operand>,
        token: Token,
        cache: std::collections::BTreeMap<String, serde_json::Value>,
    ) -> NodeRef {
        if !kind.is_singleton() {
            let node = Arc::new(ExprNode::new(kind, operands, token));
            node.cache().seed(cache);
            return node;
        }

        let mut registry = self.lock();
        if let Some(existing) = registry.entries.get(&token).and_then(Weak::upgrade) {
            existing.cache().seed(cache);
            return existing;
        }
        let node = Arc::new(ExprNode::new(kind, operands, token));
        node.cache().seed(cache);
        registry.entries.insert(token, Arc::downgrade(&node));
        registry.maybe_sweep();
        node
    }

    /// Whether a live node is registered under `token`.
    pub fn contains_live(&self, token: Token) -> bool {
        self.lock().entries.get(&token).and_then(Weak::upgrade).is_some()
    }

    /// Number of live registry entries (dead weak handles excluded).
    pub fn live_len(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Total registry entries, dead weak handles included. Stays within a
    /// constant factor of `live_len` thanks to the amortized sweep.
    pub fn registered_len(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Recover from poisoning: the registry holds only weak handles, a
        // panicked holder cannot leave it in a half-written state.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_node(it: &Interner) -> NodeRef {
        it.construct(
            OpKind::Read,
            vec![
                Operand::Str("data.parquet".into()),
                Operand::Columns(vec!["a".into(), "b".into()]),
                Operand::None,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_singleton_sharing() {
        let it = Interner::new();
        let n1 = read_node(&it);
        let n2 = read_node(&it);
        assert!(Arc::ptr_eq(&n1, &n2));
        assert_eq!(n1.name(), n2.name());
    }

    #[test]
    fn test_cache_survives_reinterning() {
        let it = Interner::new();
        let n1 = read_node(&it);
        n1.cache().insert_if_absent("expensive", json!(99));
        let n2 = read_node(&it);
        assert_eq!(n2.cache().get("expensive"), Some(json!(99)));
    }

    #[test]
    fn test_weak_entries_collected() {
        let it = Interner::new();
        let token = {
            let node = read_node(&it);
            node.token()
        };
        // The only strong reference is gone; the registry must not keep
        // the node alive.
        assert!(!it.contains_live(token));
        assert_eq!(it.live_len(), 0);
    }

    #[test]
    fn test_dead_entries_are_swept_from_the_registry() {
        let it = Interner::new();
        // Churn through many distinct short-lived nodes, the pattern a
        // rewrite pass produces when it interns transient shapes.
        for i in 0..1024 {
            let _ = it
                .construct(
                    OpKind::Read,
                    vec![
                        Operand::Str(format!("path-{}", i)),
                        Operand::Columns(vec!["a".into()]),
                        Operand::None,
                    ],
                )
                .unwrap();
        }
        let keep = read_node(&it);

        // The registry must not retain an entry per node ever constructed.
        assert!(it.registered_len() <= 2 * SWEEP_MIN);
        assert!(it.contains_live(keep.token()));
        assert_eq!(it.live_len(), 1);
    }

    #[test]
    fn test_concurrent_construction_upholds_singleton() {
        let it = Arc::new(Interner::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let it = Arc::clone(&it);
            handles.push(std::thread::spawn(move || read_node(&it)));
        }
        let nodes: Vec<NodeRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for n in &nodes[1..] {
            assert!(Arc::ptr_eq(&nodes[0], n));
        }
    }

    #[test]
    fn test_isolated_interners_do_not_share() {
        let a = Interner::new();
        let b = Interner::new();
        let n1 = read_node(&a);
        let n2 = read_node(&b);
        assert_eq!(n1.token(), n2.token());
        assert!(!Arc::ptr_eq(&n1, &n2));
    }
}
