//! Operand values: the ordered contents of an expression node.
//!
//! An operand is either a primitive/config value or an ownership reference
//! to a child node (a dependency edge). Operands are hashed, not compared:
//! node equality is token equality, so `Operand` carries no `PartialEq`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::graph::LegacyGraph;
use crate::node::NodeRef;

#[derive(Debug, Clone)]
pub enum Operand {
    /// Dependency edge to a child node.
    Node(NodeRef),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
    /// Ordered column-name list.
    Columns(Vec<String>),
    /// Predicate expression.
    Predicate(Expr),
    /// Foreign/config payload without a registered hashing strategy,
    /// digested through its serialized form. Slower, and cross-process
    /// token equality is not guaranteed for payloads we do not control.
    Json(Value),
    /// Opaque legacy graph payload; hashed by fingerprint, never persisted.
    Legacy(Arc<dyn LegacyGraph>),
    /// Absent optional value.
    None,
}

impl Operand {
    /// Wrap an arbitrary serializable value as an operand. Failure here is
    /// a `Tokenization` error: a value we cannot serialize cannot be part
    /// of a valid token.
    pub fn foreign<T: Serialize>(value: &T) -> Result<Operand> {
        serde_json::to_value(value)
            .map(Operand::Json)
            .map_err(|e| Error::Tokenization(format!("foreign operand: {}", e)))
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Operand::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_columns(&self) -> Option<&[String]> {
        match self {
            Operand::Columns(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Operand::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Operand::UInt(u) => Some(*u),
            Operand::Int(i) if *i >= 0 => Some(*i as u64),
            _ => None,
        }
    }

    pub fn as_predicate(&self) -> Option<&Expr> {
        match self {
            Operand::Predicate(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_legacy(&self) -> Option<&Arc<dyn LegacyGraph>> {
        match self {
            Operand::Legacy(g) => Some(g),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }
}
