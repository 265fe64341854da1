//! The staged optimization pipeline: simplify → tune → lower → simplify →
//! fuse.
//!
//! Stages run strictly in order, each taking and returning the same node
//! reference type, so a caller may abandon an in-flight optimization at
//! any stage boundary; nothing beyond normal interning persists from an
//! abandoned run. Lowering exposes simplifications the logical plan could
//! not see, hence the second simplify stage.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use veld_core::prelude::{Error, NodeRef, Result};
use veld_plan::props::partition_count;

use crate::engine::{PassContext, PassEngine, PassOutcome, RuleSet};
use crate::fuse::fuse;
use crate::rules::{LowerRules, SimplifyRules, TuneRules};

/// What to do when a pass hits its iteration cap before a fixpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergencePolicy {
    /// Abort the stage; the caller gets a `Convergence` error.
    Fail,
    /// Log and continue with the last stable graph.
    WarnKeep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Iteration cap per pass invocation.
    pub max_pass_iterations: usize,
    pub divergence: DivergencePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pass_iterations: 64,
            divergence: DivergencePolicy::Fail,
        }
    }
}

/// Run the full five-stage sequence. Must run before task keys are handed
/// to an execution backend, since rewriting changes node names.
pub fn optimize(root: NodeRef, ctx: &PassContext<'_>, config: &PipelineConfig) -> Result<NodeRef> {
    let engine = PassEngine::new(config.max_pass_iterations);
    let root = run_simplify(&engine, root, ctx, config)?;
    let root = run_stage(&engine, &TuneRules, root, ctx, config)?;
    let root = run_stage(&engine, &LowerRules, root, ctx, config)?;
    assert_lowered(&root)?;
    let root = run_simplify(&engine, root, ctx, config)?;
    let root = fuse(root, ctx)?;
    debug!(root = %root.name(), "optimization pipeline complete");
    Ok(root)
}

/// Standalone simplify entry point (also the pipeline's stage 1 and 4).
pub fn simplify(root: NodeRef, ctx: &PassContext<'_>, config: &PipelineConfig) -> Result<NodeRef> {
    let engine = PassEngine::new(config.max_pass_iterations);
    run_simplify(&engine, root, ctx, config)
}

/// Standalone tune entry point.
pub fn tune(root: NodeRef, ctx: &PassContext<'_>, config: &PipelineConfig) -> Result<NodeRef> {
    let engine = PassEngine::new(config.max_pass_iterations);
    run_stage(&engine, &TuneRules, root, ctx, config)
}

/// Standalone lower entry point.
pub fn lower(root: NodeRef, ctx: &PassContext<'_>, config: &PipelineConfig) -> Result<NodeRef> {
    let engine = PassEngine::new(config.max_pass_iterations);
    let root = run_stage(&engine, &LowerRules, root, ctx, config)?;
    assert_lowered(&root)?;
    Ok(root)
}

/// Simplify carries an extra contract: no rewrite may increase the
/// declared output partition count.
fn run_simplify(
    engine: &PassEngine,
    root: NodeRef,
    ctx: &PassContext<'_>,
    config: &PipelineConfig,
) -> Result<NodeRef> {
    let before = partition_count(&root)?;
    let out = run_stage(engine, &SimplifyRules, root, ctx, config)?;
    let after = partition_count(&out)?;
    if after > before {
        return Err(Error::Invariant(format!(
            "simplify increased partition count from {} to {} at '{}'",
            before,
            after,
            out.name()
        )));
    }
    Ok(out)
}

/// Run an arbitrary rule set to fixpoint under the configured iteration cap
/// and divergence policy. The named stages above are thin wrappers over
/// this.
pub fn run_rules(
    rules: &dyn RuleSet,
    root: NodeRef,
    ctx: &PassContext<'_>,
    config: &PipelineConfig,
) -> Result<NodeRef> {
    let engine = PassEngine::new(config.max_pass_iterations);
    run_stage(&engine, rules, root, ctx, config)
}

fn run_stage(
    engine: &PassEngine,
    rules: &dyn RuleSet,
    root: NodeRef,
    ctx: &PassContext<'_>,
    config: &PipelineConfig,
) -> Result<NodeRef> {
    debug!(stage = rules.name(), root = %root.name(), "stage start");
    let PassOutcome {
        root,
        iterations,
        converged,
    } = engine.run(rules, root, ctx)?;
    if !converged {
        warn!(
            stage = rules.name(),
            iterations,
            root = %root.name(),
            "stage hit iteration cap before fixpoint"
        );
        if config.divergence == DivergencePolicy::Fail {
            return Err(Error::Convergence {
                pass: rules.name().to_string(),
                iterations,
            });
        }
    }
    debug!(stage = rules.name(), iterations, root = %root.name(), "stage end");
    Ok(root)
}

/// After lowering, a surviving logical operator means no physical strategy
/// applied, which is fatal: the plan cannot reach materialization.
fn assert_lowered(root: &NodeRef) -> Result<()> {
    let mut stack = vec![root.clone()];
    let mut seen = std::collections::HashSet::new();
    while let Some(node) = stack.pop() {
        if !seen.insert(node.name().to_string()) {
            continue;
        }
        if node.kind().is_logical() {
            return Err(Error::Lowering(format!(
                "no applicable physical strategy for '{}'",
                node.name()
            )));
        }
        stack.extend(node.node_children().cloned());
    }
    Ok(())
}
