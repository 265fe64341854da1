//! Generic two-phase rewrite pass engine.
//!
//! A pass pairs a downward rule (local visibility: the node's own kind and
//! operands) with an upward rule (cross-branch visibility: a parent, one of
//! its children, and the set of all parents referencing that child). The
//! engine applies both over a DAG to a fixpoint, memoizing per node name so
//! shared subgraphs are visited once per step, and bounding iterations so a
//! pathological rule set degrades into a warning instead of a hang.
//!
//! Traversal is iterative over an explicit frame stack; recursion depth is
//! never tied to plan depth.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use veld_core::prelude::{Error, Interner, NodeRef, Operand, Result};
use veld_plan::meta::MetadataResolver;

/// All parents referencing a given child, keyed by the child's name.
pub type Dependents = HashMap<String, Vec<NodeRef>>;

/// Shared state a pass may draw on while rewriting.
pub struct PassContext<'a> {
    pub interner: &'a Interner,
    pub resolver: Option<&'a dyn MetadataResolver>,
}

impl<'a> PassContext<'a> {
    pub fn new(interner: &'a Interner) -> Self {
        Self {
            interner,
            resolver: None,
        }
    }

    pub fn with_resolver(interner: &'a Interner, resolver: &'a dyn MetadataResolver) -> Self {
        Self {
            interner,
            resolver: Some(resolver),
        }
    }
}

/// A pass's per-operator-kind rewrite rules.
///
/// Returning `Ok(None)` means "no local rewrite". The general policy is
/// that declining is a no-op, never an error; only broken correctness
/// invariants surface as `Err`.
pub trait RuleSet {
    fn name(&self) -> &'static str;

    /// Local rewrite using only the node's own kind and operands.
    fn rewrite_down(&self, node: &NodeRef, ctx: &PassContext<'_>) -> Result<Option<NodeRef>>;

    /// Rewrite of `parent` in light of its relationship to `child` and of
    /// every other parent referencing `child`.
    fn rewrite_up(
        &self,
        parent: &NodeRef,
        child: &NodeRef,
        dependents: &Dependents,
        ctx: &PassContext<'_>,
    ) -> Result<Option<NodeRef>>;
}

/// Result of running a pass: the (possibly new) root, how many full steps
/// ran, and whether a fixpoint was reached within the cap.
pub struct PassOutcome {
    pub root: NodeRef,
    pub iterations: usize,
    pub converged: bool,
}

pub struct PassEngine {
    max_iterations: usize,
}

impl PassEngine {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }

    /// Re-run the step over the (possibly new) root until a step yields no
    /// change anywhere, or the iteration cap is hit. Because every parent
    /// token embeds its children's tokens, "no change anywhere" reduces to
    /// an unchanged root name.
    pub fn run(
        &self,
        rules: &dyn RuleSet,
        root: NodeRef,
        ctx: &PassContext<'_>,
    ) -> Result<PassOutcome> {
        let mut current = root;
        for iteration in 1..=self.max_iterations {
            let next = self.step(rules, &current, ctx)?;
            if next.name() == current.name() {
                trace!(
                    pass = rules.name(),
                    iterations = iteration,
                    root = %current.name(),
                    "pass reached fixpoint"
                );
                return Ok(PassOutcome {
                    root: current,
                    iterations: iteration,
                    converged: true,
                });
            }
            current = next;
        }
        Ok(PassOutcome {
            root: current,
            iterations: self.max_iterations,
            converged: false,
        })
    }

    /// One full root-to-leaves application of the rules.
    fn step(&self, rules: &dyn RuleSet, root: &NodeRef, ctx: &PassContext<'_>) -> Result<NodeRef> {
        let dependents = collect_dependents(root);
        // Pass results keyed by the *pre-rewrite* name of each node, so a
        // subgraph referenced by many parents is rewritten once.
        let mut memo: HashMap<String, NodeRef> = HashMap::new();

        enum Frame {
            Enter(NodeRef),
            Exit { original: String, node: NodeRef },
        }

        let mut stack = vec![Frame::Enter(root.clone())];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    if memo.contains_key(node.name()) {
                        continue;
                    }
                    let rewritten = self.apply_local(rules, &node, &dependents, ctx)?;
                    stack.push(Frame::Exit {
                        original: node.name().to_string(),
                        node: rewritten.clone(),
                    });
                    for child in rewritten.node_children() {
                        if !memo.contains_key(child.name()) {
                            stack.push(Frame::Enter(child.clone()));
                        }
                    }
                }
                Frame::Exit { original, node } => {
                    let mut changed = false;
                    let mut operands = Vec::with_capacity(node.operands().len());
                    for operand in node.operands() {
                        match operand {
                            Operand::Node(child) => {
                                let replacement = memo.get(child.name()).ok_or_else(|| {
                                    Error::Invariant(format!(
                                        "pass '{}': child '{}' missing from step memo",
                                        rules.name(),
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
                        node
                    };
                    memo.insert(original, rebuilt);
                }
            }
        }

        memo.remove(root.name()).ok_or_else(|| {
            Error::Invariant(format!("pass '{}': root missing from step memo", rules.name()))
        })
    }

    /// Apply the downward and upward rules at one position until neither
    /// changes the node. A replacement whose name equals the original's is
    /// no effective change; the original is kept to preserve cache reuse.
    fn apply_local(
        &self,
        rules: &dyn RuleSet,
        node: &NodeRef,
        dependents: &Dependents,
        ctx: &PassContext<'_>,
    ) -> Result<NodeRef> {
        let mut current = node.clone();
        for _ in 0..self.max_iterations {
            let mut changed = false;

            // Bounded: an oscillating downward rule must fall through to
            // the convergence guard instead of spinning here.
            for _ in 0..self.max_iterations {
                match rules.rewrite_down(&current, ctx)? {
                    Some(next) if next.name() != current.name() => {
                        current = next;
                        changed = true;
                    }
                    _ => break,
                }
            }

            let children: Vec<NodeRef> = current.node_children().cloned().collect();
            for child in children {
                if let Some(next) = rules.rewrite_up(&current, &child, dependents, ctx)? {
                    if next.name() != current.name() {
                        current = next;
                        changed = true;
                        break;
                    }
                }
            }

            if !changed {
                break;
            }
        }
        Ok(current)
    }
}

/// Map every reachable child to the set of parents referencing it.
/// Rebuilt per step; shared children appear once with all their parents.
pub fn collect_dependents(root: &NodeRef) -> Dependents {
    let mut dependents: Dependents = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.name().to_string()) {
            continue;
        }
        for child in node.node_children() {
            let parents = dependents.entry(child.name().to_string()).or_default();
            if !parents.iter().any(|p| p.name() == node.name()) {
                parents.push(node.clone());
            }
            stack.push(child.clone());
        }
    }
    dependents
}
