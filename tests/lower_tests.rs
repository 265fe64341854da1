//! Tuning and lowering integration tests

use std::sync::Arc;

use veld_core::prelude::{keys, Error, Expr, Interner, OpKind};
use veld_opt::{lower, tune, PassContext, PipelineConfig};
use veld_plan::access::{columns_at, node_at, opt_u64_at};
use veld_plan::builders::{aggregate, cols, filter, merge, project, read};
use veld_plan::layout;
use veld_plan::meta::{FixedResolver, PartitionStats};
use veld_plan::props::partition_count;

#[test]
fn test_tune_fills_merge_output_partitions() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let l = read(&it, "s3://l", cols(&["k", "x"]), Some(4)).unwrap();
    let r = read(&it, "s3://r", cols(&["k", "y"]), Some(8)).unwrap();
    let m = merge(&it, l, r, cols(&["k"])).unwrap();
    assert_eq!(opt_u64_at(&m, layout::merge::OUTPUT_PARTITIONS).unwrap(), None);

    let out = tune(m, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::Merge);
    assert_eq!(
        opt_u64_at(&out, layout::merge::OUTPUT_PARTITIONS).unwrap(),
        Some(8)
    );
}

#[test]
fn test_tune_defaults_aggregate_to_single_partition() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://t", cols(&["k", "amount"]), Some(4)).unwrap();
    let agg = aggregate(&it, r, cols(&["k"]), cols(&["sum:amount"])).unwrap();

    let out = tune(agg, &ctx, &config).unwrap();
    assert_eq!(
        opt_u64_at(&out, layout::aggregate::OUTPUT_PARTITIONS).unwrap(),
        Some(1)
    );
}

#[test]
fn test_sibling_projections_narrow_a_shared_read() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://t", cols(&["k", "a", "b", "c"]), Some(2)).unwrap();
    let p1 = project(&it, r.clone(), cols(&["k", "a"])).unwrap();
    let p2 = project(&it, r, cols(&["k", "b"])).unwrap();
    let root = merge(&it, p1, p2, cols(&["k"])).unwrap();

    let out = tune(root, &ctx, &config).unwrap();
    let left_read = node_at(
        &node_at(&out, layout::merge::LEFT).unwrap(),
        layout::project::INPUT,
    )
    .unwrap();
    let right_read = node_at(
        &node_at(&out, layout::merge::RIGHT).unwrap(),
        layout::project::INPUT,
    )
    .unwrap();

    // Both branches converge on one read carrying the union of their
    // requests; the unused column stays on disk.
    assert!(Arc::ptr_eq(&left_read, &right_read));
    assert_eq!(
        columns_at(&left_read, layout::read::COLUMNS).unwrap(),
        cols(&["k", "a", "b"])
    );
}

#[test]
fn test_lower_with_explicit_partitions_needs_no_resolver() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://t", cols(&["k", "amount"]), Some(4)).unwrap();
    let f = filter(&it, r, Expr::parse("amount > 0").unwrap()).unwrap();

    let out = lower(f, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::BlockwiseFilter);
    let input = node_at(&out, layout::filter::INPUT).unwrap();
    assert_eq!(input.kind(), OpKind::FusedIo);
    assert_eq!(partition_count(&out).unwrap(), 4);
}

#[test]
fn test_lower_unresolved_read_without_resolver_fails() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://t", cols(&["k"]), None).unwrap();
    assert!(matches!(
        lower(r, &ctx, &config),
        Err(Error::Lowering(_))
    ));
}

#[test]
fn test_resolver_failure_names_the_node_being_lowered() {
    let it = Interner::new();
    let resolver = FixedResolver::new();
    let ctx = PassContext::with_resolver(&it, &resolver);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://t", cols(&["k"]), None).unwrap();
    let name = r.name().to_string();
    match lower(r, &ctx, &config) {
        Err(Error::Context { context, source }) => {
            assert!(context.contains(&name));
            let inner = source.downcast_ref::<Error>().unwrap();
            assert!(matches!(inner, Error::Metadata(_)));
        }
        other => panic!("expected a context-wrapped metadata error, got {:?}", other),
    }
}

#[test]
fn test_resolver_statistics_fix_the_partition_count() {
    let it = Interner::new();
    let resolver = FixedResolver::new().with(
        "s3://t",
        PartitionStats {
            partition_count: 3,
            row_estimate: Some(1200),
        },
    );
    let ctx = PassContext::with_resolver(&it, &resolver);
    let config = PipelineConfig::default();

    let r = read(&it, "s3://t", cols(&["k"]), None).unwrap();
    let out = lower(r, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::FusedIo);
    assert_eq!(partition_count(&out).unwrap(), 3);
    assert!(out.cache().get(keys::SOURCE_STATS).is_some());
}

#[test]
fn test_aligned_merge_lowers_to_blockwise() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let l = read(&it, "s3://l", cols(&["k", "x"]), Some(4)).unwrap();
    let r = read(&it, "s3://r", cols(&["k", "y"]), Some(4)).unwrap();
    let m = merge(&it, l, r, cols(&["k"])).unwrap();

    let out = lower(m, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::BlockwiseMerge);
    assert_eq!(partition_count(&out).unwrap(), 4);
}

#[test]
fn test_misaligned_merge_lowers_to_hash_join() {
    let it = Interner::new();
    let ctx = PassContext::new(&it);
    let config = PipelineConfig::default();

    let l = read(&it, "s3://l", cols(&["k", "x"]), Some(4)).unwrap();
    let r = read(&it, "s3://r", cols(&["k", "y"]), Some(2)).unwrap();
    let m = merge(&it, l, r, cols(&["k"])).unwrap();

    let out = lower(m, &ctx, &config).unwrap();
    assert_eq!(out.kind(), OpKind::HashJoinP2P);
    // The shuffle never runs with fewer partitions than its widest input.
    assert_eq!(
        opt_u64_at(&out, layout::merge::OUTPUT_PARTITIONS).unwrap(),
        Some(4)
    );
    assert_eq!(partition_count(&out).unwrap(), 4);
}
