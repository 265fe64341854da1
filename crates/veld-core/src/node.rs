//! Immutable expression nodes: the unit of the plan DAG.
//!
//! A node is fixed at construction: operator kind, ordered operands, the
//! structural token, and the derived name never change. "Rewriting" always
//! means producing a new node (or reusing an interned one) and relinking
//! the DAG, never patching fields in place. The derived-property cache is
//! the single mutable part, and it only fills empty slots.

use std::fmt;
use std::sync::Arc;

use crate::cache::DerivedCache;
use crate::hash::Token;
use crate::kind::OpKind;
use crate::operand::Operand;

/// Shared handle to an expression node.
pub type NodeRef = Arc<ExprNode>;

pub struct ExprNode {
    kind: OpKind,
    operands: Vec<Operand>,
    token: Token,
    name: String,
    cache: DerivedCache,
}

impl ExprNode {
    /// Construct with a precomputed token. Only the interner calls this;
    /// clients go through `Interner::construct` so that singleton
    /// enforcement and token validation cannot be skipped.
    pub(crate) fn new(kind: OpKind, operands: Vec<Operand>, token: Token) -> Self {
        let name = format!("{}-{}", kind.prefix(), token.short());
        Self {
            kind,
            operands,
            token,
            name,
            cache: DerivedCache::default(),
        }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn operand(&self, idx: usize) -> Option<&Operand> {
        self.operands.get(idx)
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Deduplication/memoization key: operator-kind prefix + token.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    /// Dependency edges, in operand order.
    pub fn node_children(&self) -> impl Iterator<Item = &NodeRef> {
        self.operands.iter().filter_map(Operand::as_node)
    }
}

impl fmt::Debug for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprNode")
            .field("name", &self.name)
            .field("operands", &self.operands.len())
            .finish()
    }
}
