//! Derived plan properties.
//!
//! Properties are computed per kind and memoized in the node's derived
//! cache, so repeated optimization passes over shared subgraphs pay for a
//! derivation once per node, not once per reference path.

use serde_json::json;

use veld_core::prelude::{keys, Error, NodeRef, OpKind, Result};

use crate::access::{columns_at, node_at, opt_u64_at};
use crate::layout;

/// Columns a node produces, in output order.
pub fn output_columns(node: &NodeRef) -> Result<Vec<String>> {
    let value = node
        .cache()
        .get_or_compute(keys::OUTPUT_COLUMNS, || {
            compute_output_columns(node).map(|cols| json!(cols))
        })?;
    serde_json::from_value(value)
        .map_err(|e| Error::Invariant(format!("cached output columns: {}", e)))
}

fn compute_output_columns(node: &NodeRef) -> Result<Vec<String>> {
    match node.kind() {
        OpKind::Read | OpKind::FusedIo => columns_at(node, layout::read::COLUMNS),
        OpKind::Filter | OpKind::BlockwiseFilter => {
            output_columns(&node_at(node, layout::filter::INPUT)?)
        }
        OpKind::Project | OpKind::BlockwiseProject => columns_at(node, layout::project::COLUMNS),
        OpKind::Merge | OpKind::BlockwiseMerge | OpKind::HashJoinP2P => {
            let left = output_columns(&node_at(node, layout::merge::LEFT)?)?;
            let right = output_columns(&node_at(node, layout::merge::RIGHT)?)?;
            let mut out = left;
            for col in right {
                if !out.contains(&col) {
                    out.push(col);
                }
            }
            Ok(out)
        }
        OpKind::Aggregate | OpKind::HashAggregate => {
            let mut out = columns_at(node, layout::aggregate::GROUP_BY)?;
            out.extend(columns_at(node, layout::aggregate::AGGS)?);
            Ok(out)
        }
        OpKind::Fused => output_columns(&node_at(node, layout::fused::ROOT)?),
        // Unknown from the outside; rules must not reason about opaque
        // columns.
        OpKind::Opaque => Ok(Vec::new()),
    }
}

/// Declared output partition count.
///
/// An unresolved `Read` reports 1 until lowering fixes its count from
/// source statistics; blockwise operators inherit from their input;
/// shuffle-like operators carry an explicit output-partition operand.
pub fn partition_count(node: &NodeRef) -> Result<u64> {
    let value = node
        .cache()
        .get_or_compute(keys::PARTITION_COUNT, || {
            compute_partition_count(node).map(|n| json!(n))
        })?;
    serde_json::from_value(value)
        .map_err(|e| Error::Invariant(format!("cached partition count: {}", e)))
}

fn compute_partition_count(node: &NodeRef) -> Result<u64> {
    match node.kind() {
        OpKind::Read => Ok(opt_u64_at(node, layout::read::PARTITIONS)?.unwrap_or(1)),
        OpKind::FusedIo => opt_u64_at(node, layout::read::PARTITIONS)?.ok_or_else(|| {
            Error::Invariant(format!(
                "physical read '{}' has no resolved partition count",
                node.name()
            ))
        }),
        OpKind::Filter | OpKind::BlockwiseFilter => {
            partition_count(&node_at(node, layout::filter::INPUT)?)
        }
        OpKind::Project | OpKind::BlockwiseProject => {
            partition_count(&node_at(node, layout::project::INPUT)?)
        }
        OpKind::Merge | OpKind::BlockwiseMerge => {
            let left = partition_count(&node_at(node, layout::merge::LEFT)?)?;
            let right = partition_count(&node_at(node, layout::merge::RIGHT)?)?;
            Ok(left.max(right))
        }
        OpKind::HashJoinP2P => match opt_u64_at(node, layout::merge::OUTPUT_PARTITIONS)? {
            Some(n) => Ok(n),
            None => {
                let left = partition_count(&node_at(node, layout::merge::LEFT)?)?;
                let right = partition_count(&node_at(node, layout::merge::RIGHT)?)?;
                Ok(left.max(right))
            }
        },
        OpKind::Aggregate | OpKind::HashAggregate => {
            Ok(opt_u64_at(node, layout::aggregate::OUTPUT_PARTITIONS)?.unwrap_or(1))
        }
        OpKind::Fused => partition_count(&node_at(node, layout::fused::ROOT)?),
        OpKind::Opaque => Ok(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{cols, filter, merge, project, read};
    use veld_core::prelude::{Expr, Interner};

    #[test]
    fn test_output_columns_follow_projection() {
        let it = Interner::new();
        let r = read(&it, "p", cols(&["a", "b", "c"]), None).unwrap();
        let f = filter(&it, r, Expr::parse("a > 0").unwrap()).unwrap();
        let p = project(&it, f, cols(&["b"])).unwrap();
        assert_eq!(output_columns(&p).unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_merge_columns_are_ordered_union() {
        let it = Interner::new();
        let l = read(&it, "l", cols(&["k", "x"]), None).unwrap();
        let r = read(&it, "r", cols(&["k", "y"]), None).unwrap();
        let m = merge(&it, l, r, cols(&["k"])).unwrap();
        assert_eq!(output_columns(&m).unwrap(), cols(&["k", "x", "y"]));
    }

    #[test]
    fn test_partition_count_inherited_and_cached() {
        let it = Interner::new();
        let r = read(&it, "p", cols(&["a"]), Some(8)).unwrap();
        let f = filter(&it, r.clone(), Expr::parse("a > 0").unwrap()).unwrap();
        assert_eq!(partition_count(&f).unwrap(), 8);
        // Second lookup hits the cache slot.
        assert!(f
            .cache()
            .get(veld_core::cache::keys::PARTITION_COUNT)
            .is_some());
    }

    #[test]
    fn test_unresolved_read_defaults_to_one() {
        let it = Interner::new();
        let r = read(&it, "p", cols(&["a"]), None).unwrap();
        assert_eq!(partition_count(&r).unwrap(), 1);
    }
}
