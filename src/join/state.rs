//! Planning state carried through the FROM walk
//!
//! A join attempt never mutates the state it starts from. It receives the
//! current [`PlanState`] by reference and returns a new one; the attempt
//! that loses is simply dropped.

use std::fmt;

use serde::Serialize;

use crate::catalog::Cost;
use crate::expr::Expr;
use crate::planner::PlannerResult;
use crate::registry::{FilterFlags, FilterRegistry};
use crate::sarg::ScanPlan;

/// One physical operator of the plan, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    Scan {
        scan: ScanPlan,
    },
    HashJoin {
        alias: String,
        /// Keys evaluated on the build input
        build_exprs: Vec<Expr>,
        /// Keys evaluated on the probe input
        probe_exprs: Vec<Expr>,
        /// The right-hand term is the build input
        build_right: bool,
        outer: bool,
        nest: bool,
        child: ScanPlan,
        onclause: Option<Expr>,
    },
    NestedLoopJoin {
        alias: String,
        outer: bool,
        nest: bool,
        child: ScanPlan,
        onclause: Option<Expr>,
    },
    /// Fetch by document key, no index scan
    KeyLookupJoin {
        alias: String,
        keyspace: String,
        keys: Expr,
        outer: bool,
        nest: bool,
        onclause: Option<Expr>,
    },
    Unnest {
        alias: String,
        expr: Expr,
        outer: bool,
    },
    Filter {
        expr: Expr,
    },
}

impl PlanOp {
    pub fn name(&self) -> &'static str {
        match self {
            PlanOp::Scan { .. } => "Scan",
            PlanOp::HashJoin { nest: true, .. } => "HashNest",
            PlanOp::HashJoin { .. } => "HashJoin",
            PlanOp::NestedLoopJoin { nest: true, .. } => "NestedLoopNest",
            PlanOp::NestedLoopJoin { .. } => "NestedLoopJoin",
            PlanOp::KeyLookupJoin { nest: true, .. } => "KeyLookupNest",
            PlanOp::KeyLookupJoin { .. } => "KeyLookupJoin",
            PlanOp::Unnest { .. } => "Unnest",
            PlanOp::Filter { .. } => "Filter",
        }
    }

    /// Alias the operator introduces, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            PlanOp::Scan { scan } => scan.alias(),
            PlanOp::HashJoin { alias, .. }
            | PlanOp::NestedLoopJoin { alias, .. }
            | PlanOp::KeyLookupJoin { alias, .. }
            | PlanOp::Unnest { alias, .. } => Some(alias),
            PlanOp::Filter { .. } => None,
        }
    }
}

impl fmt::Display for PlanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outer = |o: &bool| if *o { " LEFT OUTER" } else { "" };
        match self {
            PlanOp::Scan { scan } => write!(f, "{}", scan),
            PlanOp::HashJoin {
                alias,
                build_exprs,
                probe_exprs,
                build_right,
                outer: o,
                ..
            } => {
                let build: Vec<String> = build_exprs.iter().map(|e| e.to_string()).collect();
                let probe: Vec<String> = probe_exprs.iter().map(|e| e.to_string()).collect();
                write!(
                    f,
                    "{}{} {} build=[{}] probe=[{}] build_side={}",
                    self.name(),
                    outer(o),
                    alias,
                    build.join(", "),
                    probe.join(", "),
                    if *build_right { "right" } else { "left" }
                )
            }
            PlanOp::NestedLoopJoin { alias, outer: o, onclause, .. } => {
                write!(f, "{}{} {}", self.name(), outer(o), alias)?;
                if let Some(on) = onclause {
                    write!(f, " ON {}", on)?;
                }
                Ok(())
            }
            PlanOp::KeyLookupJoin {
                alias,
                keyspace,
                keys,
                outer: o,
                ..
            } => write!(f, "{}{} {} AS {} ON KEYS {}", self.name(), outer(o), keyspace, alias, keys),
            PlanOp::Unnest { alias, expr, outer: o } => {
                write!(f, "Unnest{} {} AS {}", outer(o), expr, alias)
            }
            PlanOp::Filter { expr } => write!(f, "Filter {}", expr),
        }
    }
}

/// Operators built so far, the registry they were built against, and the
/// estimated cost of the whole prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanState {
    ops: Vec<PlanOp>,
    registry: FilterRegistry,
    cost: Option<Cost>,
    planned: Vec<String>,
}

impl PlanState {
    pub fn new(registry: FilterRegistry) -> Self {
        Self {
            ops: Vec::new(),
            registry,
            cost: None,
            planned: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[PlanOp] {
        &self.ops
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn cost(&self) -> Option<Cost> {
        self.cost
    }

    /// Aliases planned so far, in plan order.
    pub fn planned(&self) -> &[String] {
        &self.planned
    }

    /// New state with `op` appended and `alias` marked planned. Join
    /// filters that became local to a remaining source move into its
    /// filters.
    pub fn with_planned(&self, op: PlanOp, alias: Option<&str>, cost: Option<Cost>) -> PlannerResult<PlanState> {
        let mut next = self.clone();
        next.ops.push(op);
        next.cost = cost;
        if let Some(alias) = alias {
            next.registry.mark_plan_done(alias)?;
            next.planned.push(alias.to_string());
        }
        Ok(next)
    }

    /// Same state with `flag` recorded on the filters of `alias` whose
    /// expression is in `exprs`.
    pub fn flag_filters(mut self, alias: &str, exprs: &[Expr], flag: FilterFlags) -> PlannerResult<PlanState> {
        self.registry.get_mut(alias)?.flag_filters(exprs, flag);
        Ok(self)
    }

    /// New state with the filters of `alias` carrying no transient flags.
    pub fn without_transient_flags(&self, alias: &str) -> PlannerResult<PlanState> {
        let mut next = self.clone();
        next.registry.get_mut(alias)?.clear_transient_flags();
        Ok(next)
    }

    /// New state with a trailing operator that plans no alias and keeps the
    /// cost.
    pub fn with_op(&self, op: PlanOp) -> PlanState {
        let mut next = self.clone();
        next.ops.push(op);
        next
    }

    /// Runs `f` on a copy of the registry, for classification of clauses
    /// that become pushable mid-walk.
    pub fn with_registry<F>(&self, f: F) -> PlannerResult<PlanState>
    where
        F: FnOnce(&mut FilterRegistry) -> PlannerResult<()>,
    {
        let mut next = self.clone();
        f(&mut next.registry)?;
        Ok(next)
    }

    pub fn into_parts(self) -> (Vec<PlanOp>, FilterRegistry, Option<Cost>) {
        (self.ops, self.registry, self.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DataSource;

    fn registry() -> FilterRegistry {
        let mut r = FilterRegistry::new();
        r.insert(DataSource::keyspace("a", "orders")).unwrap();
        r.insert(DataSource::keyspace("b", "items")).unwrap();
        r
    }

    #[test]
    fn test_with_planned_leaves_original_untouched() {
        let start = PlanState::new(registry());
        let op = PlanOp::Scan {
            scan: ScanPlan::PrimaryScan {
                alias: "a".into(),
                keyspace: "orders".into(),
                index: "#primary".into(),
            },
        };
        let next = start
            .with_planned(op, Some("a"), Some(Cost::new(10.0, 100.0, 1.0)))
            .unwrap();

        assert!(start.ops().is_empty());
        assert!(start.planned().is_empty());
        assert!(!start.registry().get("a").unwrap().plan_done);

        assert_eq!(next.ops().len(), 1);
        assert_eq!(next.planned(), &["a".to_string()]);
        assert!(next.registry().get("a").unwrap().plan_done);
        assert_eq!(next.cost().map(|c| c.cardinality), Some(100.0));
    }

    #[test]
    fn test_unknown_alias_is_internal_error() {
        let start = PlanState::new(registry());
        let err = start
            .with_planned(PlanOp::Filter { expr: crate::expr::ident("x") }, Some("zz"), None)
            .unwrap_err();
        assert_eq!(err.code().code(), "AERO_PLAN_INTERNAL");
    }

    #[test]
    fn test_op_names() {
        let op = PlanOp::NestedLoopJoin {
            alias: "b".into(),
            outer: true,
            nest: true,
            child: ScanPlan::DummyScan,
            onclause: None,
        };
        assert_eq!(op.name(), "NestedLoopNest");
        assert_eq!(op.to_string(), "NestedLoopNest LEFT OUTER b");
    }
}
