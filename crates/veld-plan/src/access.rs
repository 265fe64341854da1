//! Typed operand accessors.
//!
//! Rewrite rules and materialization read operands positionally; a
//! mismatch means a malformed node slipped past the builders, which is an
//! invariant failure rather than a recoverable condition.

use veld_core::prelude::{Error, Expr, ExprNode, NodeRef, Operand, Result};

pub fn node_at(node: &ExprNode, idx: usize) -> Result<NodeRef> {
    node.operand(idx)
        .and_then(Operand::as_node)
        .cloned()
        .ok_or_else(|| mismatch(node, idx, "node"))
}

pub fn columns_at(node: &ExprNode, idx: usize) -> Result<Vec<String>> {
    node.operand(idx)
        .and_then(Operand::as_columns)
        .map(<[String]>::to_vec)
        .ok_or_else(|| mismatch(node, idx, "columns"))
}

pub fn str_at(node: &ExprNode, idx: usize) -> Result<String> {
    node.operand(idx)
        .and_then(Operand::as_str)
        .map(str::to_string)
        .ok_or_else(|| mismatch(node, idx, "string"))
}

pub fn predicate_at(node: &ExprNode, idx: usize) -> Result<Expr> {
    node.operand(idx)
        .and_then(Operand::as_predicate)
        .cloned()
        .ok_or_else(|| mismatch(node, idx, "predicate"))
}

/// `UInt` or `None` operand: an optional count.
pub fn opt_u64_at(node: &ExprNode, idx: usize) -> Result<Option<u64>> {
    match node.operand(idx) {
        Some(Operand::None) => Ok(None),
        Some(op) => op
            .as_u64()
            .map(Some)
            .ok_or_else(|| mismatch(node, idx, "optional count")),
        None => Err(mismatch(node, idx, "optional count")),
    }
}

fn mismatch(node: &ExprNode, idx: usize, expected: &str) -> Error {
    Error::Invariant(format!(
        "node '{}' operand {} is not a {}",
        node.name(),
        idx,
        expected
    ))
}
