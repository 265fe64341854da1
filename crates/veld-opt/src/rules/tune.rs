//! Tuning: adjust execution-affecting parameters without changing logical
//! semantics.
//!
//! Tuning fills unset output-partition counts on shuffle-like operators
//! and, when several projections share one read, narrows that read to the
//! union of every requested column so no branch forces unused columns off
//! disk. Interning converges the per-branch rewrites onto a single shared
//! read node.

use std::collections::BTreeSet;

use veld_core::prelude::{NodeRef, OpKind, Operand, Result};
use veld_plan::access::{columns_at, node_at, opt_u64_at, str_at};
use veld_plan::layout;
use veld_plan::props::partition_count;

use crate::engine::{Dependents, PassContext, RuleSet};
use crate::rules::{is_project_kind, is_read_kind};

pub struct TuneRules;

impl RuleSet for TuneRules {
    fn name(&self) -> &'static str {
        "tune"
    }

    fn rewrite_down(&self, node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
        match node.kind() {
            OpKind::Merge => {
                if opt_u64_at(node, layout::merge::OUTPUT_PARTITIONS)?.is_some() {
                    return Ok(None);
                }
                let left = node_at(node, layout::merge::LEFT)?;
                let right = node_at(node, layout::merge::RIGHT)?;
                let parts = partition_count(&left)?.max(partition_count(&right)?);
                let tuned = ctx.interner.construct(
                    OpKind::Merge,
                    vec![
                        Operand::Node(left),
                        Operand::Node(right),
                        Operand::Columns(columns_at(node, layout::merge::ON)?),
                        Operand::UInt(parts),
                    ],
                )?;
                Ok(Some(tuned))
            }
            OpKind::Aggregate => {
                if opt_u64_at(node, layout::aggregate::OUTPUT_PARTITIONS)?.is_some() {
                    return Ok(None);
                }
                // Global reduction target; grouped output fits one
                // partition until statistics argue otherwise.
                let tuned = ctx.interner.construct(
                    OpKind::Aggregate,
                    vec![
                        Operand::Node(node_at(node, layout::aggregate::INPUT)?),
                        Operand::Columns(columns_at(node, layout::aggregate::GROUP_BY)?),
                        Operand::Columns(columns_at(node, layout::aggregate::AGGS)?),
                        Operand::UInt(1),
                    ],
                )?;
                Ok(Some(tuned))
            }
            _ => Ok(None),
        }
    }

    fn rewrite_up(
        &self,
        parent: &NodeRef,
        child: &NodeRef,
        dependents: &Dependents,
        ctx: &PassContext<'_>,
    ) -> Result<Option<NodeRef>> {
        if !is_project_kind(parent.kind()) || !is_read_kind(child.kind()) {
            return Ok(None);
        }
        let Some(parents) = dependents.get(child.name()) else {
            return Ok(None);
        };
        if parents.len() < 2 || !parents.iter().all(|p| is_project_kind(p.kind())) {
            return Ok(None);
        }

        // Union of every sibling projection's request, in read order.
        let mut requested: BTreeSet<String> = BTreeSet::new();
        for p in parents {
            requested.extend(columns_at(p, layout::project::COLUMNS)?);
        }
        let available = columns_at(child, layout::read::COLUMNS)?;
        if !requested.iter().all(|c| available.contains(c)) {
            return Ok(None);
        }
        if requested.len() >= available.len() {
            return Ok(None);
        }
        let narrowed_cols: Vec<String> = available
            .into_iter()
            .filter(|c| requested.contains(c))
            .collect();

        let path = str_at(child, layout::read::PATH)?;
        let partitions = opt_u64_at(child, layout::read::PARTITIONS)?;
        let narrowed_read = ctx.interner.construct(
            child.kind(),
            vec![
                Operand::Str(path),
                Operand::Columns(narrowed_cols),
                partitions.map_or(Operand::None, Operand::UInt),
            ],
        )?;
        let new_parent = ctx.interner.construct(
            parent.kind(),
            vec![
                Operand::Node(narrowed_read),
                Operand::Columns(columns_at(parent, layout::project::COLUMNS)?),
            ],
        )?;
        Ok(Some(new_parent))
    }
}
