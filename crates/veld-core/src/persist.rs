//! Persisted node form.
//!
//! A persisted node carries operator kind, operands (children nested),
//! name, full token hex, and the derived-cache entries the kind allows to
//! survive serialization. Restoring on a process that trusts the sender's
//! tokens reconstructs an identical node (same name/token) without
//! recomputation; when the token is already live in the receiving
//! interner, the existing singleton wins and restored cache entries merge
//! into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::hash::Token;
use crate::interner::Interner;
use crate::kind::OpKind;
use crate::node::{ExprNode, NodeRef};
use crate::operand::Operand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedNode {
    pub kind: OpKind,
    pub operands: Vec<PersistedOperand>,
    pub name: String,
    pub token: String,
    pub cache: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PersistedOperand {
    Node(PersistedNode),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
    Columns(Vec<String>),
    Predicate(Expr),
    Json(Value),
    None,
}

/// Convert a node (and its reachable children) into the persisted form.
/// Legacy graph payloads have no serialized representation; plans holding
/// them must be persisted without the opaque fragment.
pub fn to_persisted(node: &ExprNode) -> Result<PersistedNode> {
    let mut operands = Vec::with_capacity(node.operands().len());
    for operand in node.operands() {
        operands.push(persist_operand(operand)?);
    }
    let cache = node
        .cache()
        .entries()
        .into_iter()
        .filter(|(k, _)| node.kind().persists_cache_key(k))
        .collect();
    Ok(PersistedNode {
        kind: node.kind(),
        operands,
        name: node.name().to_string(),
        token: node.token().to_hex(),
        cache,
    })
}

fn persist_operand(operand: &Operand) -> Result<PersistedOperand> {
    Ok(match operand {
        Operand::Node(n) => PersistedOperand::Node(to_persisted(n)?),
        Operand::Bool(b) => PersistedOperand::Bool(*b),
        Operand::Int(i) => PersistedOperand::Int(*i),
        Operand::UInt(u) => PersistedOperand::UInt(*u),
        Operand::Str(s) => PersistedOperand::Str(s.clone()),
        Operand::Columns(c) => PersistedOperand::Columns(c.clone()),
        Operand::Predicate(e) => PersistedOperand::Predicate(e.clone()),
        Operand::Json(v) => PersistedOperand::Json(v.clone()),
        Operand::Legacy(_) => {
            return Err(Error::Persist(
                "legacy graph payloads have no persisted form".into(),
            ))
        }
        Operand::None => PersistedOperand::None,
    })
}

/// Restore a node into `interner`, trusting the sender's tokens.
pub fn from_persisted(interner: &Interner, persisted: &PersistedNode) -> Result<NodeRef> {
    let mut operands = Vec::with_capacity(persisted.operands.len());
    for operand in &persisted.operands {
        operands.push(restore_operand(interner, operand)?);
    }
    let token = Token::from_hex(&persisted.token)?;
    let expected = format!("{}-{}", persisted.kind.prefix(), token.short());
    if expected != persisted.name {
        return Err(Error::Persist(format!(
            "name '{}' does not match token-derived name '{}'",
            persisted.name, expected
        )));
    }
    Ok(interner.adopt(persisted.kind, operands, token, persisted.cache.clone()))
}

fn restore_operand(interner: &Interner, operand: &PersistedOperand) -> Result<Operand> {
    Ok(match operand {
        PersistedOperand::Node(p) => Operand::Node(from_persisted(interner, p)?),
        PersistedOperand::Bool(b) => Operand::Bool(*b),
        PersistedOperand::Int(i) => Operand::Int(*i),
        PersistedOperand::UInt(u) => Operand::UInt(*u),
        PersistedOperand::Str(s) => Operand::Str(s.clone()),
        PersistedOperand::Columns(c) => Operand::Columns(c.clone()),
        PersistedOperand::Predicate(e) => Operand::Predicate(e.clone()),
        PersistedOperand::Json(v) => Operand::Json(v.clone()),
        PersistedOperand::None => Operand::None,
    })
}
