//! Join strategy selection
//!
//! For each JOIN or NEST of the FROM clause two branches are tried from
//! the same [`PlanState`]:
//!
//! 1. Hash join: the right-hand term is built on its own and matched on
//!    equality keys. Only tried when hash joins are enabled and either a
//!    hint asks for one or a cost oracle is present.
//! 2. Nested loop: the right-hand term is scanned once per left row, so
//!    the join predicate can drive its index selection. An equality on the
//!    right-hand document key becomes a key lookup instead.
//!
//! [`select_join`] keeps one of them, or fails when neither is feasible.

mod hash;
mod nested_loop;
mod selector;
mod state;

pub use hash::{equi_join_keys, try_hash_join};
pub use nested_loop::{primary_lookup_keys, try_nested_loop};
pub use selector::select_join;
pub use state::{PlanOp, PlanState};

use crate::catalog::{Catalog, Cost, CostOracle, JoinMethod};
use crate::expr::Expr;
use crate::planner::{HintViolation, PlannerConfig, SimpleTerm, Statement};
use crate::sarg::{ScanBuilder, ScanPlan, ScanRequirements};

/// The JOIN or NEST being planned.
#[derive(Debug, Clone, Copy)]
pub struct JoinNode<'t> {
    pub right: &'t SimpleTerm,
    pub onclause: Option<&'t Expr>,
    pub outer: bool,
    pub nest: bool,
}

/// Capabilities and settings shared by every join of one statement.
#[derive(Clone, Copy)]
pub struct JoinContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub oracle: Option<&'a dyn CostOracle>,
    pub config: &'a PlannerConfig,
    /// LIMIT of a statement without ORDER BY or GROUP BY
    pub limit: Option<u64>,
    /// Statement being planned, for covering and pushdown checks
    pub statement: Option<&'a Statement>,
}

impl<'a> JoinContext<'a> {
    pub fn scan_builder(&self, alias: &str) -> ScanBuilder<'a> {
        let builder = ScanBuilder::new(self.catalog, self.oracle, self.config.span_fanout_limit);
        match self.statement {
            Some(stmt) => builder.with_requirements(ScanRequirements::for_alias(stmt, alias)),
            None => builder,
        }
    }

    pub fn cost_based(&self) -> bool {
        self.oracle.is_some()
    }

    /// Cost used to compare alternatives: first-row biased under a bare
    /// LIMIT.
    pub fn comparable(&self, cost: &Cost) -> f64 {
        match self.limit {
            Some(limit) => cost.limited(limit),
            None => cost.cost,
        }
    }
}

/// A feasible outcome of one join attempt.
#[derive(Debug, Clone)]
pub struct JoinBranch {
    pub state: PlanState,
    pub method: JoinMethod,
    pub violations: Vec<HintViolation>,
}

/// Scan operator for a non-keyspace right-hand term.
fn derived_scan(term: &SimpleTerm, planned: &[String]) -> Option<ScanPlan> {
    match term {
        SimpleTerm::Keyspace(_) => None,
        SimpleTerm::Expression(t) => Some(ScanPlan::ExpressionScan {
            alias: t.alias.clone(),
            expr: t.expr.clone(),
            correlated: term.is_correlated(planned),
        }),
        SimpleTerm::Subquery(t) => Some(ScanPlan::SubqueryScan {
            alias: t.alias.clone(),
            text: t.text.clone(),
            correlated: t.correlated,
        }),
    }
}
