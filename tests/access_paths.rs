//! Access Path Tests
//!
//! Tests for index selection end to end:
//! - IN lists on a single-key index become ordered point spans
//! - Disjunctions over a composite index become a flat union of terms
//! - Disjunctions over different indexes become a union scan
//! - Partial indexes and USE INDEX hints are honored
//! - Covering indexes take over projection, ORDER BY, LIMIT and OFFSET

use aeroquery::catalog::{IndexDef, IndexKeyDef, InMemoryCatalog};
use aeroquery::expr::{and, constant, eq, gt, ident, in_list, or, path, Expr};
use aeroquery::join::PlanOp;
use aeroquery::planner::{FromTerm, Hints, PlannerConfig, QueryPlanner, Statement, StatementPlan};
use aeroquery::sarg::{sarg_for, Pushdowns, SargSpans, ScanPlan};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn catalog(indexes: Vec<IndexDef>) -> InMemoryCatalog {
    let mut cat = InMemoryCatalog::new()
        .with_keyspace("orders", Some(1000))
        .with_index("orders", IndexDef::primary("#primary"));
    for index in indexes {
        cat = cat.with_index("orders", index);
    }
    cat
}

fn plan(cat: &InMemoryCatalog, from: FromTerm, pred: Expr) -> StatementPlan {
    QueryPlanner::new(cat, PlannerConfig::default())
        .plan(&Statement::new(from).with_where(pred))
        .unwrap()
}

fn first_scan(plan: &StatementPlan) -> &ScanPlan {
    match &plan.ops[0] {
        PlanOp::Scan { scan } => scan,
        other => panic!("expected a scan, got {:?}", other),
    }
}

fn pushdowns(plan: &StatementPlan) -> Pushdowns {
    match first_scan(plan) {
        ScanPlan::IndexScan { pushdowns, .. } => *pushdowns,
        other => panic!("expected an index scan, got {:?}", other),
    }
}

fn x_eq(v: i64) -> Expr {
    eq(path("a", "x"), constant(json!(v)))
}

fn y_eq(v: i64) -> Expr {
    eq(path("a", "y"), constant(json!(v)))
}

// =============================================================================
// Span Shape Tests
// =============================================================================

/// x IN [3,1,2,1] on (x) gives the points 1, 2, 3 as one term.
#[test]
fn test_in_list_on_single_key_index() {
    let keys = vec![IndexKeyDef::scalar(ident("x")).formalize("a")];
    let pred = in_list(path("a", "x"), constant(json!([3, 1, 2, 1])));

    let sarg = sarg_for(&pred, &keys, "a", 8192).unwrap();
    assert!(matches!(&sarg.spans, SargSpans::Term(ts) if ts.len() == 3));
    assert_eq!(sarg.spans.to_string(), "{[1, 1]}, {[2, 2]}, {[3, 3]}");
    assert!(sarg.is_exact());

    let cat = catalog(vec![IndexDef::secondary("ix_x", vec![ident("x")])]);
    let plan = plan(&cat, FromTerm::keyspace("a", "orders"), pred);
    match first_scan(&plan) {
        ScanPlan::IndexScan { index, spans, exact, .. } => {
            assert_eq!(index, "ix_x");
            assert_eq!(spans.to_string(), "{[1, 1]}, {[2, 2]}, {[3, 3]}");
            assert!(*exact);
        }
        other => panic!("expected an index scan, got {:?}", other),
    }
}

/// (x=1 AND y=2) OR (x=3 AND y=4) on (x, y) gives a union of two
/// two-position points, not nested further.
#[test]
fn test_composite_disjunction_is_flat_union() {
    let keys = vec![
        IndexKeyDef::scalar(ident("x")).formalize("a"),
        IndexKeyDef::scalar(ident("y")).formalize("a"),
    ];
    let pred = or(vec![and(vec![x_eq(1), y_eq(2)]), and(vec![x_eq(3), y_eq(4)])]);

    let sarg = sarg_for(&pred, &keys, "a", 8192).unwrap();
    assert_eq!(sarg.sarg_keys, 2);
    match &sarg.spans {
        SargSpans::Union(members) => {
            assert_eq!(members.len(), 2);
            for member in members {
                match member {
                    SargSpans::Term(spans) => {
                        assert_eq!(spans.len(), 1);
                        assert_eq!(spans[0].ranges.len(), 2);
                    }
                    other => panic!("expected a term, got {}", other),
                }
            }
        }
        other => panic!("expected a union, got {}", other),
    }
    assert_eq!(sarg.spans.streamline(), sarg.spans);
    assert_eq!(
        sarg.spans.to_string(),
        "UNION({[1, 1] [2, 2]}; {[3, 3] [4, 4]})"
    );

    let cat = catalog(vec![IndexDef::secondary("ix_xy", vec![ident("x"), ident("y")])]);
    let plan = plan(&cat, FromTerm::keyspace("a", "orders"), pred);
    match first_scan(&plan) {
        ScanPlan::IndexScan { index, spans, .. } => {
            assert_eq!(index, "ix_xy");
            assert!(matches!(spans, SargSpans::Union(m) if m.len() == 2));
        }
        other => panic!("expected an index scan, got {:?}", other),
    }
}

// =============================================================================
// Scan Choice Tests
// =============================================================================

/// x = 1 OR y = 2 with separate indexes gives a union scan.
#[test]
fn test_disjunction_over_two_indexes() {
    let cat = catalog(vec![
        IndexDef::secondary("ix_x", vec![ident("x")]),
        IndexDef::secondary("ix_y", vec![ident("y")]),
    ]);
    let plan = plan(&cat, FromTerm::keyspace("a", "orders"), or(vec![x_eq(1), y_eq(2)]));
    let scan = first_scan(&plan);
    assert_eq!(scan.kind(), "UnionScan");
    assert_eq!(scan.index_names(), vec!["ix_x", "ix_y"]);
}

/// A partial index is used only when its condition is in the predicate.
#[test]
fn test_partial_index_requires_condition() {
    let cat = catalog(vec![IndexDef::secondary("ix_active_x", vec![ident("x")])
        .with_condition(eq(ident("active"), constant(json!(true))))]);

    let plan_without = plan(&cat, FromTerm::keyspace("a", "orders"), x_eq(1));
    assert_eq!(first_scan(&plan_without).kind(), "PrimaryScan");

    let pred = and(vec![x_eq(1), eq(path("a", "active"), constant(json!(true)))]);
    let plan_with = plan(&cat, FromTerm::keyspace("a", "orders"), pred);
    assert_eq!(first_scan(&plan_with).index_names(), vec!["ix_active_x"]);
}

/// USE INDEX narrows the candidates; an unusable hint is a warning.
#[test]
fn test_use_index_hint() {
    let cat = catalog(vec![
        IndexDef::secondary("ix_x", vec![ident("x")]),
        IndexDef::secondary("ix_y", vec![ident("y")]),
    ]);
    let pred = and(vec![x_eq(1), y_eq(2)]);

    let unhinted = plan(&cat, FromTerm::keyspace("a", "orders"), pred.clone());
    assert_eq!(first_scan(&unhinted).kind(), "IntersectScan");

    let hinted = plan(
        &cat,
        FromTerm::keyspace_with_hints("a", "orders", Hints::use_index(&["ix_y"])),
        pred.clone(),
    );
    assert_eq!(first_scan(&hinted).index_names(), vec!["ix_y"]);
    assert!(hinted.warnings.is_empty());

    let bad = plan(
        &cat,
        FromTerm::keyspace_with_hints("a", "orders", Hints::use_index(&["ix_missing"])),
        pred,
    );
    assert_eq!(first_scan(&bad).kind(), "IntersectScan");
    assert_eq!(bad.warnings.len(), 1);
    assert_eq!(bad.warnings[0].hint, "USE INDEX(ix_missing)");
}

/// Without a usable secondary index the planner falls back to the
/// primary index and keeps the predicate as a filter.
#[test]
fn test_primary_scan_fallback() {
    let cat = catalog(vec![IndexDef::secondary("ix_x", vec![ident("x")])]);
    let pred = eq(path("a", "z"), constant(json!("q")));
    let plan = plan(&cat, FromTerm::keyspace("a", "orders"), pred.clone());

    assert_eq!(first_scan(&plan).kind(), "PrimaryScan");
    assert_eq!(plan.ops.last(), Some(&PlanOp::Filter { expr: pred }));
}

// =============================================================================
// Pushdown Tests
// =============================================================================

/// SELECT a.x FROM orders a WHERE a.x > 5 ORDER BY a.x LIMIT 10 OFFSET 20
/// reads only the index, in index order, and stops after the page.
#[test]
fn test_covering_scan_takes_order_limit_offset() {
    let cat = catalog(vec![IndexDef::secondary("ix_x", vec![ident("x")])]);
    let stmt = Statement::new(FromTerm::keyspace("a", "orders"))
        .with_where(gt(path("a", "x"), constant(json!(5))))
        .with_projection(vec![path("a", "x")])
        .with_order_by(path("a", "x"), false)
        .with_limit(10)
        .with_offset(20);
    let plan = QueryPlanner::new(&cat, PlannerConfig::default()).plan(&stmt).unwrap();

    assert_eq!(
        pushdowns(&plan),
        Pushdowns {
            covering: true,
            index_order: true,
            limit: Some(10),
            offset: Some(20),
        }
    );
    assert!(first_scan(&plan)
        .to_string()
        .ends_with("covering index_order offset=20 limit=10"));
}

/// A projected field outside the index needs the document; a descending
/// ORDER BY cannot follow an ascending key, so the limit stays above.
#[test]
fn test_pushdowns_withheld() {
    let cat = catalog(vec![IndexDef::secondary("ix_x", vec![ident("x")])]);
    let base = Statement::new(FromTerm::keyspace("a", "orders"))
        .with_where(gt(path("a", "x"), constant(json!(5))))
        .with_limit(10);
    let planner = QueryPlanner::new(&cat, PlannerConfig::default());

    let fetched = planner
        .plan(&base.clone().with_projection(vec![path("a", "z")]))
        .unwrap();
    let p = pushdowns(&fetched);
    assert!(!p.covering);
    assert_eq!(p.limit, Some(10));

    let whole = planner.plan(&base.clone()).unwrap();
    assert!(!pushdowns(&whole).covering);

    let reversed = planner.plan(&base.with_order_by(path("a", "x"), true)).unwrap();
    let p = pushdowns(&reversed);
    assert!(!p.index_order);
    assert_eq!(p.limit, None);
}
