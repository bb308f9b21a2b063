//! Nested-loop join attempt

use crate::catalog::{JoinMethod, JoinShape};
use crate::expr::Expr;
use crate::observability::{log_event, PlanEvent};
use crate::planner::{PlannerError, PlannerResult};
use crate::registry::{DataSource, FilterFlags};
use crate::sarg::ScanMode;

use super::{derived_scan, JoinBranch, JoinContext, JoinNode, PlanOp, PlanState};

/// Key expression of an equality or IN on the source's document key.
///
/// `META(b).id = a.ref` or `META(b).id IN a.refs`: the other operand must
/// not read the source itself.
pub fn primary_lookup_keys(source: &DataSource) -> Option<Expr> {
    primary_lookup(source).map(|(_, keys)| keys)
}

/// The lookup filter with its key expression.
fn primary_lookup(source: &DataSource) -> Option<(Expr, Expr)> {
    let id = Expr::MetaId(source.alias.clone());
    let usable = |e: &Expr| !e.references(&source.alias) && !e.has_subquery();

    source
        .filters
        .iter()
        .filter(|f| !source.is_postjoin_filter(f))
        .find_map(|f| {
            let keys = match f.expr() {
                Expr::Eq(a, b) if **a == id && usable(b) => b,
                Expr::Eq(a, b) if **b == id && usable(a) => a,
                Expr::In(a, b) if **a == id && usable(b) => b,
                _ => return None,
            };
            Some((f.expr().clone(), (**keys).clone()))
        })
}

/// Plans the right-hand term as the inner side of a nested loop.
///
/// Fails with `AERO_PLAN_NO_JOIN_PATH` when a keyspace term has neither a
/// key lookup nor a secondary index for its predicates.
pub fn try_nested_loop(ctx: &JoinContext<'_>, state: &PlanState, node: &JoinNode<'_>) -> PlannerResult<JoinBranch> {
    let alias = node.right.alias();
    log_event(PlanEvent::JoinNestedLoopAttempt, &[("alias", alias)]);

    let join_cost = |method: JoinMethod, right| {
        ctx.oracle.and_then(|o| {
            o.join_cost(&JoinShape {
                alias,
                method,
                outer: node.outer,
                nest: node.nest,
                left: state.cost(),
                right,
                onclause: node.onclause,
            })
        })
    };

    if let Some(scan) = derived_scan(node.right, state.planned()) {
        let op = PlanOp::NestedLoopJoin {
            alias: alias.to_string(),
            outer: node.outer,
            nest: node.nest,
            child: scan,
            onclause: node.onclause.cloned(),
        };
        let cost = join_cost(JoinMethod::NestedLoop, None);
        return Ok(JoinBranch {
            state: state.with_planned(op, Some(alias), cost)?,
            method: JoinMethod::NestedLoop,
            violations: Vec::new(),
        });
    }

    let source = state.registry().get(alias)?;
    let keyspace = source
        .keyspace
        .clone()
        .ok_or_else(|| PlannerError::internal(format!("keyspace term '{}' has no keyspace", alias)))?;

    if let Some((lookup, keys)) = primary_lookup(source) {
        let op = PlanOp::KeyLookupJoin {
            alias: alias.to_string(),
            keyspace,
            keys,
            outer: node.outer,
            nest: node.nest,
            onclause: node.onclause.cloned(),
        };
        let cost = join_cost(JoinMethod::KeyLookup, None);
        let state = state
            .with_planned(op, Some(alias), cost)?
            .flag_filters(alias, &[lookup], FilterFlags::PRIMARY_JOIN)?;
        return Ok(JoinBranch {
            state,
            method: JoinMethod::KeyLookup,
            violations: Vec::new(),
        });
    }

    let index_hints = node.right.hints().map(|h| h.index.as_slice()).unwrap_or(&[]);
    let built = ctx
        .scan_builder(alias)
        .build(source, ScanMode::NestedLoop, index_hints, source.cached_document_count())
        .map_err(|e| {
            if e.is_recoverable() {
                PlannerError::no_join_path(alias, "no secondary index and no key lookup for the join")
            } else {
                e
            }
        })?;

    let op = PlanOp::NestedLoopJoin {
        alias: alias.to_string(),
        outer: node.outer,
        nest: node.nest,
        child: built.plan,
        onclause: node.onclause.cloned(),
    };
    let cost = join_cost(JoinMethod::NestedLoop, built.cost);
    let state = state
        .with_planned(op, Some(alias), cost)?
        .flag_filters(alias, &built.spanned, FilterFlags::INDEX_SPAN)?;
    Ok(JoinBranch {
        state,
        method: JoinMethod::NestedLoop,
        violations: built.violations,
    })
}
