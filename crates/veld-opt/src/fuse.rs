//! Blockwise fusion: collapse linear chains of composable physical nodes
//! into single `Fused` containers, shrinking the task count handed to the
//! executor.
//!
//! Unlike the staged rule sets, fusion needs whole-chain visibility (a
//! node joins a chain only when its sole dependent is also in the chain),
//! so it runs as one dedicated bottom-up traversal over the engine's
//! dependents map rather than as per-node rules.
//!
//! A `Fused` node keeps the chain's rebuilt root as its only dependency
//! edge and records the member names as a plain operand, so membership is
//! part of the token and survives interning.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::debug;

use veld_core::prelude::{Error, NodeRef, OpKind, Operand, Result};

use crate::engine::{collect_dependents, PassContext};

/// Fuse every maximal linear blockwise chain under `root`.
pub fn fuse(root: NodeRef, ctx: &PassContext<'_>) -> Result<NodeRef> {
    let dependents = collect_dependents(&root);

    // A node is absorbed into its parent's chain when both are blockwise
    // and the parent is its only dependent. Branching and sharing break
    // chains; shuffle-like and opaque nodes never join one.
    let mut absorbed: HashSet<String> = HashSet::new();
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.name().to_string()) {
                continue;
            }
            for child in node.node_children() {
                if node.kind().is_blockwise()
                    && child.kind().is_blockwise()
                    && dependents.get(child.name()).map(Vec::len) == Some(1)
                {
                    absorbed.insert(child.name().to_string());
                }
                stack.push(child.clone());
            }
        }
    }

    let is_head =
        |node: &NodeRef| node.kind().is_blockwise() && !absorbed.contains(node.name());

    // Bottom-up rebuild. `plain` holds each node rebuilt with absorbed
    // children kept inline and non-absorbed children replaced by their
    // fused-world form; `fused_world` additionally wraps chain heads.
    let mut plain: HashMap<String, NodeRef> = HashMap::new();
    let mut fused_world: HashMap<String, NodeRef> = HashMap::new();

    enum Frame {
        Enter(NodeRef),
        Exit(NodeRef),
    }

    let mut stack = vec![Frame::Enter(root.clone())];
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if plain.contains_key(node.name()) {
                    continue;
                }
                stack.push(Frame::Exit(node.clone()));
                for child in node.node_children() {
                    if !plain.contains_key(child.name()) {
                        stack.push(Frame::Enter(child.clone()));
                    }
                }
            }
            Frame::Exit(node) => {
                let mut changed = false;
                let mut operands = Vec::with_capacity(node.operands().len());
                for operand in node.operands() {
                    match operand {
                        Operand::Node(child) => {
                            let lookup = if absorbed.contains(child.name()) {
                                plain.get(child.name())
                            } else {
                                fused_world.get(child.name())
                            };
                            let replacement = lookup.ok_or_else(|| {
                                Error::Invariant(format!(
                                    "fusion: child '{}' missing from rebuild memo",
                                    child.name()
                                ))
                            })?;
                            if replacement.name() != child.name() {
                                changed = true;
                            }
                            operands.push(Operand::Node(replacement.clone()));
                        }
                        other => operands.push(other.clone()),
                    }
                }
                let rebuilt = if changed {
                    ctx.interner.construct(node.kind(), operands)?
                } else {
                    node.clone()
                };

                let final_form = if is_head(&node) {
                    let members = chain_members(&node, &rebuilt, &absorbed, &plain)?;
                    if members.len() >= 2 {
                        debug!(
                            head = %rebuilt.name(),
                            members = members.len(),
                            "fusing blockwise chain"
                        );
                        ctx.interner.construct(
                            OpKind::Fused,
                            vec![Operand::Node(rebuilt.clone()), Operand::Json(json!(members))],
                        )?
                    } else {
                        rebuilt.clone()
                    }
                } else {
                    rebuilt.clone()
                };

                plain.insert(node.name().to_string(), rebuilt);
                fused_world.insert(node.name().to_string(), final_form);
            }
        }
    }

    fused_world.remove(root.name()).ok_or_else(|| {
        Error::Invariant("fusion: root missing from rebuild memo".to_string())
    })
}

/// Names of the chain rooted at `head`, head included. Membership is
/// decided on the *original* graph (the `absorbed` set; an absorbed node's
/// unique dependent is its chain parent), but the names recorded are those
/// of the rebuilt nodes the `Fused` container actually holds.
fn chain_members(
    original_head: &NodeRef,
    rebuilt_head: &NodeRef,
    absorbed: &HashSet<String>,
    plain: &HashMap<String, NodeRef>,
) -> Result<Vec<String>> {
    let mut members = vec![rebuilt_head.name().to_string()];
    let mut stack = vec![original_head.clone()];
    while let Some(node) = stack.pop() {
        for child in node.node_children() {
            if absorbed.contains(child.name()) {
                let rebuilt = plain.get(child.name()).ok_or_else(|| {
                    Error::Invariant(format!(
                        "fusion: chain member '{}' missing from rebuild memo",
                        child.name()
                    ))
                })?;
                members.push(rebuilt.name().to_string());
                stack.push(child.clone());
            }
        }
    }
    members.sort();
    members.dedup();
    Ok(members)
}
