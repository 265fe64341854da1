//! Materialization: convert an optimized node DAG into the low-level task
//! mapping executors understand.
//!
//! Task keys are node names. Each physical node becomes one task whose
//! dependencies are its children's names; a `Fused` container becomes a
//! single task depending only on the chain's external inputs; an opaque
//! node splices in its legacy graph's tasks (converted at most once, see
//! `legacy`) plus an alias from the node name to the legacy output key.
//!
//! The walk is iterative and visits each name once, so shared subgraphs
//! produce one task no matter how many parents reference them.

use std::collections::{BTreeSet, HashSet};

use serde_json::{json, Value};
use tracing::debug;

use veld_core::prelude::{Error, NodeRef, OpKind, Operand, Result, Task, TaskGraph};
use veld_plan::access::node_at;
use veld_plan::layout;

/// Produce the task graph for an optimized plan. Logical operators must
/// not survive to this point; run `optimize` first.
pub fn materialize(root: &NodeRef) -> Result<TaskGraph> {
    let mut tasks = TaskGraph::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if !seen.insert(node.name().to_string()) {
            continue;
        }
        if node.kind().is_logical() {
            return Err(Error::Materialize(format!(
                "logical operator '{}' reached materialization; run optimize first",
                node.name()
            )));
        }
        match node.kind() {
            OpKind::Fused => {
                let (task, externals) = fused_task(&node)?;
                tasks.insert(node.name().to_string(), task);
                stack.extend(externals);
            }
            OpKind::Opaque => {
                splice_legacy(&node, &mut tasks)?;
            }
            _ => {
                let deps: Vec<String> =
                    node.node_children().map(|c| c.name().to_string()).collect();
                tasks.insert(
                    node.name().to_string(),
                    Task {
                        spec: task_spec(&node)?,
                        deps,
                    },
                );
                stack.extend(node.node_children().cloned());
            }
        }
    }

    debug!(root = %root.name(), tasks = tasks.len(), "materialized task graph");
    Ok(tasks)
}

fn task_spec(node: &NodeRef) -> Result<Value> {
    Ok(json!({
        "op": node.kind().prefix(),
        "args": summarize_operands(node)?,
    }))
}

// Dependency edges are carried in `deps`, not repeated in the spec.
fn summarize_operands(node: &NodeRef) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for operand in node.operands() {
        match operand {
            Operand::Node(_) => {}
            Operand::Bool(b) => out.push(json!(b)),
            Operand::Int(i) => out.push(json!(i)),
            Operand::UInt(u) => out.push(json!(u)),
            Operand::Str(s) => out.push(json!(s)),
            Operand::Columns(c) => out.push(json!(c)),
            Operand::Predicate(e) => out.push(
                serde_json::to_value(e)
                    .map_err(|err| Error::Materialize(format!("predicate spec: {}", err)))?,
            ),
            Operand::Json(v) => out.push(v.clone()),
            Operand::Legacy(_) => out.push(json!("<legacy>")),
            Operand::None => out.push(Value::Null),
        }
    }
    Ok(out)
}

/// One task for the whole chain; dependencies are the chain's external
/// inputs, which the caller continues traversing.
fn fused_task(node: &NodeRef) -> Result<(Task, Vec<NodeRef>)> {
    let inner = node_at(node, layout::fused::ROOT)?;
    let members: HashSet<String> = match node.operand(layout::fused::MEMBERS) {
        Some(Operand::Json(v)) => serde_json::from_value(v.clone())
            .map_err(|e| Error::Invariant(format!("fused member list: {}", e)))?,
        _ => {
            return Err(Error::Invariant(format!(
                "fused node '{}' has no member list",
                node.name()
            )))
        }
    };

    let mut externals: Vec<NodeRef> = Vec::new();
    let mut external_keys: BTreeSet<String> = BTreeSet::new();
    let mut walked: HashSet<String> = HashSet::new();
    let mut stack = vec![inner.clone()];
    while let Some(member) = stack.pop() {
        if !walked.insert(member.name().to_string()) {
            continue;
        }
        for child in member.node_children() {
            if members.contains(child.name()) {
                stack.push(child.clone());
            } else if external_keys.insert(child.name().to_string()) {
                externals.push(child.clone());
            }
        }
    }

    let mut member_names: Vec<&String> = members.iter().collect();
    member_names.sort();
    let task = Task {
        spec: json!({
            "op": "fused",
            "root": inner.name(),
            "members": member_names,
        }),
        deps: external_keys.into_iter().collect(),
    };
    Ok((task, externals))
}

fn splice_legacy(node: &NodeRef, tasks: &mut TaskGraph) -> Result<()> {
    let graph = node
        .operand(layout::opaque::GRAPH)
        .and_then(Operand::as_legacy)
        .ok_or_else(|| {
            Error::Invariant(format!("opaque node '{}' has no graph payload", node.name()))
        })?;

    // Deferred conversion happens here, on the executor's request.
    let legacy_tasks = graph.to_tasks();
    let output_key = graph.output_key();
    if !legacy_tasks.contains_key(&output_key) {
        return Err(Error::Materialize(format!(
            "legacy graph output key '{}' missing from its own task graph",
            output_key
        )));
    }
    for (key, task) in legacy_tasks {
        tasks.entry(key).or_insert(task);
    }
    tasks.insert(
        node.name().to_string(),
        Task {
            spec: json!({"op": "alias", "target": output_key.clone()}),
            deps: vec![output_key],
        },
    );
    Ok(())
}
