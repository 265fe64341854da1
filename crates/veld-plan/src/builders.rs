//! Plan construction API.
//!
//! Every builder routes through `Interner::construct`, so building the same
//! subplan twice hands back the same shared node with its caches intact.

use veld_core::prelude::{Expr, Interner, NodeRef, OpKind, Operand, Result};

/// Convenience for turning string slices into a column list.
pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// I/O source node. `partitions` stays unresolved (`None`) until tuning or
/// lowering fixes it, optionally via metadata resolution.
pub fn read(
    interner: &Interner,
    path: &str,
    columns: Vec<String>,
    partitions: Option<u64>,
) -> Result<NodeRef> {
    interner.construct(
        OpKind::Read,
        vec![
            Operand::Str(path.to_string()),
            Operand::Columns(columns),
            partitions.map_or(Operand::None, Operand::UInt),
        ],
    )
}

pub fn filter(interner: &Interner, input: NodeRef, predicate: Expr) -> Result<NodeRef> {
    interner.construct(
        OpKind::Filter,
        vec![Operand::Node(input), Operand::Predicate(predicate)],
    )
}

pub fn project(interner: &Interner, input: NodeRef, columns: Vec<String>) -> Result<NodeRef> {
    interner.construct(
        OpKind::Project,
        vec![Operand::Node(input), Operand::Columns(columns)],
    )
}

/// Logical join on equal key columns. The output partition count is left
/// unset; tuning fills it and lowering picks the physical strategy.
pub fn merge(
    interner: &Interner,
    left: NodeRef,
    right: NodeRef,
    on: Vec<String>,
) -> Result<NodeRef> {
    interner.construct(
        OpKind::Merge,
        vec![
            Operand::Node(left),
            Operand::Node(right),
            Operand::Columns(on),
            Operand::None,
        ],
    )
}

/// Logical grouped aggregation. `aggs` uses the `"<fn>:<column>"` spec
/// form, e.g. `"sum:amount"`.
pub fn aggregate(
    interner: &Interner,
    input: NodeRef,
    group_by: Vec<String>,
    aggs: Vec<String>,
) -> Result<NodeRef> {
    interner.construct(
        OpKind::Aggregate,
        vec![
            Operand::Node(input),
            Operand::Columns(group_by),
            Operand::Columns(aggs),
            Operand::None,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_builders_deduplicate() {
        let it = Interner::new();
        let r1 = read(&it, "data.parquet", cols(&["a", "b"]), None).unwrap();
        let r2 = read(&it, "data.parquet", cols(&["a", "b"]), None).unwrap();
        assert!(Arc::ptr_eq(&r1, &r2));

        let f1 = filter(&it, r1.clone(), Expr::parse("a > 0").unwrap()).unwrap();
        let f2 = filter(&it, r2, Expr::parse("a > 0").unwrap()).unwrap();
        assert!(Arc::ptr_eq(&f1, &f2));
    }

    #[test]
    fn test_name_carries_kind_prefix() {
        let it = Interner::new();
        let r = read(&it, "data.parquet", cols(&["a"]), None).unwrap();
        assert!(r.name().starts_with("read-"));
        let p = project(&it, r, cols(&["a"])).unwrap();
        assert!(p.name().starts_with("project-"));
    }

    #[test]
    fn test_column_order_distinguishes_nodes() {
        let it = Interner::new();
        let r1 = read(&it, "p", cols(&["a", "b"]), None).unwrap();
        let r2 = read(&it, "p", cols(&["b", "a"]), None).unwrap();
        assert_ne!(r1.token(), r2.token());
    }
}
