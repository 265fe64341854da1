//! Lowering: replace logical operator kinds with concrete physical ones.
//!
//! This is the logical→physical boundary. Reads may require partition
//! statistics from the metadata resolver, a blocking, client-side call.
//! Resolution failures are reported against the node being lowered; retry
//! policy belongs to the metadata source. Join strategy is decided only
//! once both inputs are
//! physical, so their partition counts are final; until then the rule
//! declines and the pass's next iteration picks the join up again.

use serde_json::json;

use veld_core::prelude::{keys, Error, NodeRef, OpKind, Operand, Result};
use veld_plan::access::{columns_at, node_at, opt_u64_at, str_at};
use veld_plan::layout;
use veld_plan::props::partition_count;

use crate::engine::{Dependents, PassContext, RuleSet};

pub struct LowerRules;

impl RuleSet for LowerRules {
    fn name(&self) -> &'static str {
        "lower"
    }

    fn rewrite_down(&self, node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
        match node.kind() {
            OpKind::Read => lower_read(node, ctx).map(Some),
            OpKind::Filter => {
                let lowered = ctx
                    .interner
                    .construct(OpKind::BlockwiseFilter, node.operands().to_vec())?;
                Ok(Some(lowered))
            }
            OpKind::Project => {
                let lowered = ctx
                    .interner
                    .construct(OpKind::BlockwiseProject, node.operands().to_vec())?;
                Ok(Some(lowered))
            }
            OpKind::Merge => lower_merge(node, ctx),
            OpKind::Aggregate => {
                let parts = opt_u64_at(node, layout::aggregate::OUTPUT_PARTITIONS)?.unwrap_or(1);
                let lowered = ctx.interner.construct(
                    OpKind::HashAggregate,
                    vec![
                        Operand::Node(node_at(node, layout::aggregate::INPUT)?),
                        Operand::Columns(columns_at(node, layout::aggregate::GROUP_BY)?),
                        Operand::Columns(columns_at(node, layout::aggregate::AGGS)?),
                        Operand::UInt(parts),
                    ],
                )?;
                Ok(Some(lowered))
            }
            // Physical and opaque nodes pass through unchanged.
            _ => Ok(None),
        }
    }

    fn rewrite_up(
        &self,
        _parent: &NodeRef,
        _child: &NodeRef,
        _dependents: &Dependents,
        _ctx: &PassContext<'_>,
    ) -> Result<Option<NodeRef>> {
        Ok(None)
    }
}

/// Read -> FusedIo with a fixed partition count. Plans whose reads carry an
/// explicit count never touch the resolver.
fn lower_read(node: &NodeRef, ctx: &PassContext<'_>) -> Result<NodeRef> {
    let path = str_at(node, layout::read::PATH)?;
    let columns = columns_at(node, layout::read::COLUMNS)?;

    let (parts, stats) = match opt_u64_at(node, layout::read::PARTITIONS)? {
        Some(n) => (n, None),
        None => {
            let resolver = ctx.resolver.ok_or_else(|| {
                Error::Lowering(format!(
                    "read '{}' has no partition count and no metadata resolver is available",
                    node.name()
                ))
            })?;
            let stats = resolver
                .partition_stats(&path)
                .map_err(|e| e.with_context(format!("lowering '{}'", node.name())))?;
            (stats.partition_count, Some(stats))
        }
    };

    let lowered = ctx.interner.construct(
        OpKind::FusedIo,
        vec![
            Operand::Str(path),
            Operand::Columns(columns),
            Operand::UInt(parts),
        ],
    )?;
    if let Some(stats) = stats {
        lowered
            .cache()
            .insert_if_absent(keys::SOURCE_STATS, json!(stats));
    }
    Ok(lowered)
}

/// Merge -> BlockwiseMerge when partitioning already aligns, else a
/// shuffle-based HashJoinP2P. Waits until both inputs are physical so the
/// alignment decision sees resolved partition counts.
fn lower_merge(node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
    let left = node_at(node, layout::merge::LEFT)?;
    let right = node_at(node, layout::merge::RIGHT)?;
    if !left.kind().is_physical() || !right.kind().is_physical() {
        return Ok(None);
    }

    let on = columns_at(node, layout::merge::ON)?;
    let left_parts = partition_count(&left)?;
    let right_parts = partition_count(&right)?;

    let lowered = if left_parts == right_parts {
        ctx.interner.construct(
            OpKind::BlockwiseMerge,
            vec![
                Operand::Node(left),
                Operand::Node(right),
                Operand::Columns(on),
            ],
        )?
    } else {
        // The tuned count was chosen before reads were resolved; never let
        // it under-provision the shuffle.
        let parts = opt_u64_at(node, layout::merge::OUTPUT_PARTITIONS)?
            .unwrap_or(0)
            .max(left_parts)
            .max(right_parts);
        ctx.interner.construct(
            OpKind::HashJoinP2P,
            vec![
                Operand::Node(left),
                Operand::Node(right),
                Operand::Columns(on),
                Operand::UInt(parts),
            ],
        )?
    };
    Ok(Some(lowered))
}
