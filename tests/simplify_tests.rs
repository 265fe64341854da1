//! Simplification pass integration tests

use veld_core::prelude::{Expr, Interner, OpKind};
use veld_opt::rules::SimplifyRules;
use veld_opt::{collect_dependents, simplify, PassContext, PipelineConfig, RuleSet};
use veld_plan::access::{columns_at, node_at, predicate_at};
use veld_plan::builders::{cols, filter, merge, project, read};
use veld_plan::layout;
use veld_plan::props::partition_count;

#[test]
fn test_filter_over_projection_narrows_the_read() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://bucket/events", cols(&["a", "b", "c"]), Some(2)).unwrap();
    let p = project(&it, r, cols(&["a", "b"])).unwrap();
    let f = filter(&it, p, Expr::parse("a > 0").unwrap()).unwrap();
    let before = f.name().to_string();

    let out = simplify(f, &ctx, &config).unwrap();

    // The filter sits directly on a read that only produces the two
    // surviving columns; the projection is gone.
    assert_ne!(out.name(), before);
    assert_eq!(out.kind(), OpKind::Filter);
    assert_eq!(
        predicate_at(&out, layout::filter::PREDICATE).unwrap(),
        Expr::parse("a > 0").unwrap()
    );
    let input = node_at(&out, layout::filter::INPUT).unwrap();
    assert_eq!(input.kind(), OpKind::Read);
    assert_eq!(
        columns_at(&input, layout::read::COLUMNS).unwrap(),
        cols(&["a", "b"])
    );
    assert_eq!(partition_count(&out).unwrap(), 2);
}

#[test]
fn test_simplify_is_idempotent() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://bucket/events", cols(&["a", "b", "c"]), Some(2)).unwrap();
    let p = project(&it, r, cols(&["a", "b"])).unwrap();
    let f = filter(&it, p, Expr::parse("a > 0").unwrap()).unwrap();

    let once = simplify(f, &ctx, &config).unwrap();
    let twice = simplify(once.clone(), &ctx, &config).unwrap();
    assert_eq!(once.name(), twice.name());
}

#[test]
fn test_stacked_filters_merge_conjunctively() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://bucket/events", cols(&["a", "b"]), Some(2)).unwrap();
    let f1 = filter(&it, r, Expr::parse("a > 0").unwrap()).unwrap();
    let f2 = filter(&it, f1, Expr::parse("b < 5").unwrap()).unwrap();

    let out = simplify(f2, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::Filter);
    let input = node_at(&out, layout::filter::INPUT).unwrap();
    assert_eq!(input.kind(), OpKind::Read);
    // Inner predicate first, outer second.
    let expected = Expr::parse("a > 0")
        .unwrap()
        .and(Expr::parse("b < 5").unwrap());
    assert_eq!(
        predicate_at(&out, layout::filter::PREDICATE).unwrap(),
        expected
    );
}

#[test]
fn test_stacked_projections_collapse_into_the_read() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://bucket/events", cols(&["a", "b", "c"]), Some(2)).unwrap();
    let p1 = project(&it, r, cols(&["a", "b"])).unwrap();
    let p2 = project(&it, p1, cols(&["a"])).unwrap();

    let out = simplify(p2, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::Read);
    assert_eq!(
        columns_at(&out, layout::read::COLUMNS).unwrap(),
        cols(&["a"])
    );
}

#[test]
fn test_identity_projection_is_dropped() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://bucket/events", cols(&["a", "b"]), Some(2)).unwrap();
    let p = project(&it, r.clone(), cols(&["a", "b"])).unwrap();

    let out = simplify(p, &ctx, &config).unwrap();
    assert!(std::sync::Arc::ptr_eq(&out, &r));
}

#[test]
fn test_shared_projection_blocks_filter_pushdown() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);

    let r = read(&it, "s3://bucket/events", cols(&["k", "a", "b"]), Some(2)).unwrap();
    let p = project(&it, r, cols(&["k", "a"])).unwrap();
    let f1 = filter(&it, p.clone(), Expr::parse("a > 0").unwrap()).unwrap();
    let f2 = filter(&it, p.clone(), Expr::parse("a < 9").unwrap()).unwrap();
    let root = merge(&it, f1.clone(), f2, cols(&["k"])).unwrap();

    // Two filters depend on the projection; pushing either one below it
    // would split the shared subexpression.
    let dependents = collect_dependents(&root);
    let res = SimplifyRules
        .rewrite_up(&f1, &p, &dependents, &ctx)
        .unwrap();
    assert!(res.is_none());
}
