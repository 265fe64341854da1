//! Simplification: rewrites to semantically equivalent, cheaper forms.
//!
//! Every rule here moves work toward the sources or removes it outright;
//! none may increase the output partition count, and none triggers
//! side-effecting computation. The rules are registered for both the
//! logical kinds and their physical counterparts, since the pipeline
//! re-runs simplification on the lowered plan.
//!
//! Convergence shape: filters only ever move *down*, reads only ever get
//! *narrower*, and collapse/identity rules strictly shrink the graph, so
//! no rule pair can oscillate.

use std::collections::BTreeSet;

use veld_core::prelude::{NodeRef, OpKind, Operand, Result};
use veld_plan::access::{columns_at, node_at, opt_u64_at, predicate_at, str_at};
use veld_plan::layout;
use veld_plan::props::output_columns;

use crate::engine::{Dependents, PassContext, RuleSet};
use crate::rules::{is_filter_kind, is_project_kind, is_read_kind};

pub struct SimplifyRules;

impl RuleSet for SimplifyRules {
    fn name(&self) -> &'static str {
        "simplify"
    }

    fn rewrite_down(&self, node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
        if is_filter_kind(node.kind()) {
            return collapse_stacked_filters(node, ctx);
        }
        if is_project_kind(node.kind()) {
            if let Some(n) = collapse_stacked_projections(node, ctx)? {
                return Ok(Some(n));
            }
            if let Some(n) = drop_identity_projection(node)? {
                return Ok(Some(n));
            }
            if let Some(n) = prune_read_columns(node, ctx)? {
                return Ok(Some(n));
            }
            return narrow_read_below_filter(node, ctx);
        }
        Ok(None)
    }

    /// Push a filter beneath a projection, but only when this parent is
    /// the projection's sole dependent. A projection shared by other
    /// branches stays put: pushing into it would force the shared
    /// subexpression apart and recompute it per branch.
    fn rewrite_up(
        &self,
        parent: &NodeRef,
        child: &NodeRef,
        dependents: &Dependents,
        ctx: &PassContext<'_>,
    ) -> Result<Option<NodeRef>> {
        let swap_ok = matches!(
            (parent.kind(), child.kind()),
            (OpKind::Filter, OpKind::Project)
                | (OpKind::BlockwiseFilter, OpKind::BlockwiseProject)
        );
        if !swap_ok {
            return Ok(None);
        }
        if dependents
            .get(child.name())
            .map(|parents| parents.len())
            .unwrap_or(0)
            > 1
        {
            return Ok(None);
        }

        let predicate = predicate_at(parent, layout::filter::PREDICATE)?;
        let columns = columns_at(child, layout::project::COLUMNS)?;
        let column_set: BTreeSet<&String> = columns.iter().collect();
        if !predicate.columns().iter().all(|c| column_set.contains(c)) {
            return Ok(None);
        }

        let inner = node_at(child, layout::project::INPUT)?;
        let pushed = ctx.interner.construct(
            parent.kind(),
            vec![Operand::Node(inner), Operand::Predicate(predicate)],
        )?;
        let lifted = ctx.interner.construct(
            child.kind(),
            vec![Operand::Node(pushed), Operand::Columns(columns)],
        )?;
        Ok(Some(lifted))
    }
}

/// Filter(Filter(x, p1), p2) -> Filter(x, p1 AND p2).
fn collapse_stacked_filters(node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
    let input = node_at(node, layout::filter::INPUT)?;
    if input.kind() != node.kind() {
        return Ok(None);
    }
    let outer = predicate_at(node, layout::filter::PREDICATE)?;
    let inner_pred = predicate_at(&input, layout::filter::PREDICATE)?;
    let grandchild = node_at(&input, layout::filter::INPUT)?;
    let combined = ctx.interner.construct(
        node.kind(),
        vec![
            Operand::Node(grandchild),
            Operand::Predicate(inner_pred.and(outer)),
        ],
    )?;
    Ok(Some(combined))
}

/// Project(Project(x, a), b) -> Project(x, b) when b is contained in a.
fn collapse_stacked_projections(
    node: &NodeRef,
    ctx: &PassContext<'_>,
) -> Result<Option<NodeRef>> {
    let input = node_at(node, layout::project::INPUT)?;
    if input.kind() != node.kind() {
        return Ok(None);
    }
    let outer = columns_at(node, layout::project::COLUMNS)?;
    let inner: BTreeSet<String> = columns_at(&input, layout::project::COLUMNS)?
        .into_iter()
        .collect();
    if !outer.iter().all(|c| inner.contains(c)) {
        return Ok(None);
    }
    let grandchild = node_at(&input, layout::project::INPUT)?;
    let collapsed = ctx.interner.construct(
        node.kind(),
        vec![Operand::Node(grandchild), Operand::Columns(outer)],
    )?;
    Ok(Some(collapsed))
}

/// Project(x, cols) -> x when x already produces exactly `cols`.
fn drop_identity_projection(node: &NodeRef) -> Result<Option<NodeRef>> {
    let input = node_at(node, layout::project::INPUT)?;
    if input.kind() == OpKind::Opaque {
        return Ok(None);
    }
    let columns = columns_at(node, layout::project::COLUMNS)?;
    if output_columns(&input)? == columns {
        return Ok(Some(input));
    }
    Ok(None)
}

/// Project(Read(path, cols), sub) -> Read(path, sub) when sub is contained
/// in cols. The read simply stops producing unused columns.
fn prune_read_columns(node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
    let input = node_at(node, layout::project::INPUT)?;
    if !is_read_kind(input.kind()) {
        return Ok(None);
    }
    let requested = columns_at(node, layout::project::COLUMNS)?;
    let available: BTreeSet<String> = columns_at(&input, layout::read::COLUMNS)?
        .into_iter()
        .collect();
    if !requested.iter().all(|c| available.contains(c)) {
        return Ok(None);
    }
    let path = str_at(&input, layout::read::PATH)?;
    let partitions = opt_u64_at(&input, layout::read::PARTITIONS)?;
    let narrowed = ctx.interner.construct(
        input.kind(),
        vec![
            Operand::Str(path),
            Operand::Columns(requested),
            partitions.map_or(Operand::None, Operand::UInt),
        ],
    )?;
    Ok(Some(narrowed))
}

/// Project(Filter(Read(path, cols), p), sub): the read only needs the
/// projected columns plus whatever the predicate touches.
fn narrow_read_below_filter(node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>> {
    let filter = node_at(node, layout::project::INPUT)?;
    if !is_filter_kind(filter.kind()) {
        return Ok(None);
    }
    let read = node_at(&filter, layout::filter::INPUT)?;
    if !is_read_kind(read.kind()) {
        return Ok(None);
    }

    let projected = columns_at(node, layout::project::COLUMNS)?;
    let predicate = predicate_at(&filter, layout::filter::PREDICATE)?;
    let mut needed: BTreeSet<String> = projected.iter().cloned().collect();
    needed.extend(predicate.columns());

    let available = columns_at(&read, layout::read::COLUMNS)?;
    if !needed.iter().all(|c| available.contains(c)) {
        return Ok(None);
    }
    // Strict narrowing only; an already-minimal read stays untouched.
    if needed.len() >= available.len() {
        return Ok(None);
    }
    let narrowed_cols: Vec<String> = available
        .into_iter()
        .filter(|c| needed.contains(c))
        .collect();

    let path = str_at(&read, layout::read::PATH)?;
    let partitions = opt_u64_at(&read, layout::read::PARTITIONS)?;
    let narrowed_read = ctx.interner.construct(
        read.kind(),
        vec![
            Operand::Str(path),
            Operand::Columns(narrowed_cols),
            partitions.map_or(Operand::None, Operand::UInt),
        ],
    )?;
    let new_filter = ctx.interner.construct(
        filter.kind(),
        vec![Operand::Node(narrowed_read), Operand::Predicate(predicate)],
    )?;
    let new_project = ctx.interner.construct(
        node.kind(),
        vec![Operand::Node(new_filter), Operand::Columns(projected)],
    )?;
    Ok(Some(new_project))
}
