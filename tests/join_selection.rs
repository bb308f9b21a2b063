//! Join Selection Tests
//!
//! Tests for join strategy choice through the planner:
//! - Equi-joins without indexes plan as hash joins under a cost oracle
//! - USE HASH and USE NL hints are honored or reported
//! - Costs decide between feasible strategies
//! - Document-key equalities plan as key lookups

use aeroquery::catalog::{Cost, CostOracle, IndexDef, InMemoryCatalog, JoinMethod, JoinShape};
use aeroquery::expr::{eq, ident, meta_id, path, Expr};
use aeroquery::join::PlanOp;
use aeroquery::planner::{
    ExplainPlan, FromTerm, HashSide, Hints, JoinHint, PlannerConfig, QueryPlanner, SimpleTerm,
    Statement, StatementPlan,
};
use aeroquery::registry::FilterFlags;
use aeroquery::sarg::{SargSpans, ScanPlan};

// =============================================================================
// Stub Cost Oracle
// =============================================================================

/// Scans cost their document count; joins cost what the fields say.
struct StubOracle {
    hash: f64,
    nested: f64,
}

impl CostOracle for StubOracle {
    fn selectivity(&self, _: &Expr, _: &str, _: u64) -> Option<f64> {
        None
    }

    fn index_scan_cost(&self, _: &str, _: &IndexDef, _: &SargSpans, doc_count: u64) -> Option<Cost> {
        let n = doc_count as f64 / 10.0;
        Some(Cost::new(n, n, 1.0))
    }

    fn primary_scan_cost(&self, _: &str, doc_count: u64) -> Option<Cost> {
        let n = doc_count as f64;
        Some(Cost::new(n, n, 1.0))
    }

    fn join_cost(&self, shape: &JoinShape<'_>) -> Option<Cost> {
        let c = match shape.method {
            JoinMethod::Hash { .. } => self.hash,
            JoinMethod::NestedLoop | JoinMethod::KeyLookup => self.nested,
        };
        Some(Cost::new(c, 100.0, 1.0))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn catalog(index_on_k: bool) -> InMemoryCatalog {
    let cat = InMemoryCatalog::new()
        .with_keyspace("orders", Some(1000))
        .with_index("orders", IndexDef::primary("#primary"))
        .with_keyspace("items", Some(100))
        .with_index("items", IndexDef::primary("#primary"));
    if index_on_k {
        cat.with_index("items", IndexDef::secondary("ix_k", vec![ident("k")]))
    } else {
        cat
    }
}

/// `a JOIN b ON a.k = b.k`, with optional hints on b.
fn equi_join(hints: Option<Hints>) -> Statement {
    let right = match hints {
        Some(h) => SimpleTerm::keyspace_with_hints("b", "items", h),
        None => SimpleTerm::keyspace("b", "items"),
    };
    Statement::new(FromTerm::keyspace("a", "orders").join(
        right,
        Some(eq(path("a", "k"), path("b", "k"))),
        false,
    ))
}

fn b_flags(plan: &StatementPlan) -> FilterFlags {
    plan.registry.get("b").unwrap().filters[0].flags()
}

fn join_op(plan: &StatementPlan) -> &PlanOp {
    plan.ops
        .iter()
        .find(|op| op.alias() == Some("b"))
        .unwrap_or_else(|| panic!("no operator for b in {:?}", plan.ops))
}

// =============================================================================
// Hash Join Tests
// =============================================================================

/// No index on k, hash joins enabled: the join is a hash join building
/// on b.k and probing with a.k.
#[test]
fn test_equi_join_without_index_is_hash_join() {
    let cat = catalog(false);
    let oracle = StubOracle {
        hash: 10.0,
        nested: 1.0,
    };
    let planner = QueryPlanner::new(&cat, PlannerConfig::default()).with_oracle(&oracle);
    let plan = planner.plan(&equi_join(None)).unwrap();

    match join_op(&plan) {
        PlanOp::HashJoin {
            build_exprs,
            probe_exprs,
            build_right,
            child,
            ..
        } => {
            assert_eq!(build_exprs, &vec![path("b", "k")]);
            assert_eq!(probe_exprs, &vec![path("a", "k")]);
            assert!(*build_right);
            assert_eq!(child.kind(), "PrimaryScan");
        }
        other => panic!("expected a hash join, got {:?}", other),
    }
    assert!(!plan.ops.iter().any(|op| matches!(op, PlanOp::NestedLoopJoin { .. })));
    assert_eq!(planner.metrics().snapshot().hash_joins, 1);
    assert!(b_flags(&plan).contains(FilterFlags::HASH_JOIN));

    let explain = ExplainPlan::from_plan(&plan);
    assert!(explain
        .operators
        .iter()
        .any(|l| l.contains("HashJoin b") && l.contains("build_side=right")));
}

/// Rule-based planning without a hint never tries a hash join.
#[test]
fn test_rule_based_without_index_has_no_join_path() {
    let cat = catalog(false);
    let planner = QueryPlanner::new(&cat, PlannerConfig::default());
    let err = planner.plan(&equi_join(None)).unwrap_err();
    assert_eq!(err.code().code(), "AERO_PLAN_NO_JOIN_PATH");
    assert_eq!(err.alias(), Some("b"));
    assert_eq!(planner.metrics().snapshot().statements_rejected, 1);
}

/// USE HASH(PROBE) on an inner join makes b the probe side.
#[test]
fn test_probe_hint_flips_sides() {
    let cat = catalog(false);
    let planner = QueryPlanner::new(&cat, PlannerConfig::default());
    let plan = planner
        .plan(&equi_join(Some(Hints::use_hash(HashSide::Probe))))
        .unwrap();

    match join_op(&plan) {
        PlanOp::HashJoin {
            build_exprs,
            probe_exprs,
            build_right,
            ..
        } => {
            assert!(!*build_right);
            assert_eq!(build_exprs, &vec![path("a", "k")]);
            assert_eq!(probe_exprs, &vec![path("b", "k")]);
        }
        other => panic!("expected a hash join, got {:?}", other),
    }
    assert!(plan.warnings.is_empty());
}

// =============================================================================
// Cost-Based Choice Tests
// =============================================================================

/// With both strategies feasible the cheaper one wins.
#[test]
fn test_oracle_decides_between_strategies() {
    let cat = catalog(true);

    let oracle = StubOracle {
        hash: 5.0,
        nested: 50.0,
    };
    let plan = QueryPlanner::new(&cat, PlannerConfig::default())
        .with_oracle(&oracle)
        .plan(&equi_join(None))
        .unwrap();
    assert!(matches!(join_op(&plan), PlanOp::HashJoin { .. }));

    let oracle = StubOracle {
        hash: 50.0,
        nested: 5.0,
    };
    let plan = QueryPlanner::new(&cat, PlannerConfig::default())
        .with_oracle(&oracle)
        .plan(&equi_join(None))
        .unwrap();
    match join_op(&plan) {
        PlanOp::NestedLoopJoin { child, .. } => assert_eq!(child.index_names(), vec!["ix_k"]),
        other => panic!("expected a nested-loop join, got {:?}", other),
    }
    assert_eq!(plan.cost.map(|c| c.cost), Some(5.0));
    // the losing hash attempt leaves nothing behind
    assert!(b_flags(&plan).contains(FilterFlags::INDEX_SPAN));
    assert!(!b_flags(&plan).contains(FilterFlags::HASH_JOIN));
}

/// Equal costs keep the nested loop.
#[test]
fn test_cost_tie_keeps_nested_loop() {
    let cat = catalog(true);
    let oracle = StubOracle {
        hash: 7.0,
        nested: 7.0,
    };
    let plan = QueryPlanner::new(&cat, PlannerConfig::default())
        .with_oracle(&oracle)
        .plan(&equi_join(None))
        .unwrap();
    assert!(matches!(join_op(&plan), PlanOp::NestedLoopJoin { .. }));
}

// =============================================================================
// Hint Tests
// =============================================================================

/// Conflicting join hints are dropped with a warning.
#[test]
fn test_conflicting_hints_reported() {
    let cat = catalog(true);
    let hints = Hints {
        join: vec![JoinHint::UseHash(HashSide::Build), JoinHint::UseNl],
        index: vec![],
    };
    let planner = QueryPlanner::new(&cat, PlannerConfig::default());
    let plan = planner.plan(&equi_join(Some(hints))).unwrap();

    assert!(matches!(join_op(&plan), PlanOp::NestedLoopJoin { .. }));
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].alias, "b");
    assert_eq!(plan.warnings[0].hint, "USE HASH(BUILD), USE NL");
    assert_eq!(planner.metrics().snapshot().hint_violations, 1);
}

/// USE NL without an index falls back to a hash join with a warning.
#[test]
fn test_infeasible_nested_loop_hint_falls_back() {
    let cat = catalog(false);
    let plan = QueryPlanner::new(&cat, PlannerConfig::default())
        .plan(&equi_join(Some(Hints::use_nl())))
        .unwrap();

    assert!(matches!(join_op(&plan), PlanOp::HashJoin { .. }));
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].reason, "nested-loop join is not feasible");
}

/// USE HASH with hash joins disabled plans a nested loop and warns.
#[test]
fn test_hash_hint_with_hash_disabled() {
    let cat = catalog(true);
    let plan = QueryPlanner::new(&cat, PlannerConfig::rule_based())
        .plan(&equi_join(Some(Hints::use_hash(HashSide::Either))))
        .unwrap();

    assert!(matches!(join_op(&plan), PlanOp::NestedLoopJoin { .. }));
    assert_eq!(plan.warnings[0].reason, "hash join is disabled");
}

// =============================================================================
// Key Lookup Tests
// =============================================================================

/// META(b).id = a.ref fetches b by key without an index scan.
#[test]
fn test_document_key_join_is_lookup() {
    let cat = catalog(false);
    let stmt = Statement::new(FromTerm::keyspace("a", "orders").join(
        SimpleTerm::keyspace("b", "items"),
        Some(eq(meta_id("b"), path("a", "ref"))),
        false,
    ));
    let planner = QueryPlanner::new(&cat, PlannerConfig::default());
    let plan = planner.plan(&stmt).unwrap();

    match join_op(&plan) {
        PlanOp::KeyLookupJoin { keyspace, keys, .. } => {
            assert_eq!(keyspace, "items");
            assert_eq!(keys, &path("a", "ref"));
        }
        other => panic!("expected a key lookup, got {:?}", other),
    }
    assert!(matches!(
        plan.ops[0],
        PlanOp::Scan {
            scan: ScanPlan::PrimaryScan { .. }
        }
    ));
    assert_eq!(planner.metrics().snapshot().lookup_joins, 1);
    assert!(b_flags(&plan).contains(FilterFlags::PRIMARY_JOIN));
}
