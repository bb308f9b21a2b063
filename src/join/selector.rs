//! Choice between the hash and nested-loop branches

use crate::catalog::JoinMethod;
use crate::observability::{log_event, PlanEvent};
use crate::planner::{HintViolation, JoinHint, PlannerError, PlannerResult};

use super::hash::try_hash_join;
use super::nested_loop::try_nested_loop;
use super::{JoinBranch, JoinContext, JoinNode, PlanState};

fn method_name(method: JoinMethod) -> &'static str {
    match method {
        JoinMethod::Hash { .. } => "hash",
        JoinMethod::NestedLoop => "nested_loop",
        JoinMethod::KeyLookup => "key_lookup",
    }
}

/// Plans one JOIN or NEST.
///
/// A hinted method is used whenever it is feasible. Without a hint, and
/// with both branches feasible, the cheaper one wins under a cost oracle;
/// the nested loop wins otherwise. A hint that cannot be honored is
/// reported, never an error. When no branch is feasible the nested-loop
/// error is returned, or `AERO_PLAN_NO_ACCESS_PATH` if a cost-based hash
/// attempt also failed.
pub fn select_join(ctx: &JoinContext<'_>, state: &PlanState, node: &JoinNode<'_>) -> PlannerResult<JoinBranch> {
    let alias = node.right.alias();
    let (hint, conflict) = node
        .right
        .hints()
        .map(|h| h.join_hint(alias))
        .unwrap_or((None, None));
    let mut violations: Vec<HintViolation> = conflict.into_iter().collect();
    let state = &state.without_transient_flags(alias)?;

    // a USE NL hint still needs the hash branch as its fallback
    let hash_attempted = ctx.config.hash_join_enabled && (hint.is_some() || ctx.cost_based());
    let hash = if hash_attempted {
        try_hash_join(ctx, state, node, hint)?
    } else {
        None
    };
    let nested = match try_nested_loop(ctx, state, node) {
        Ok(branch) => Ok(branch),
        Err(e) if e.is_recoverable() => Err(e),
        Err(e) => return Err(e),
    };

    let infeasible = |nl_error: PlannerError| {
        if hash_attempted && ctx.cost_based() {
            PlannerError::no_access_path(alias)
        } else {
            nl_error
        }
    };

    let mut chosen = match hint {
        Some(h @ JoinHint::UseNl) => match (nested, hash) {
            (Ok(nl), _) => nl,
            (Err(_), Some(hj)) => {
                violations.push(HintViolation::new(alias, h.to_string(), "nested-loop join is not feasible"));
                hj
            }
            (Err(e), None) => return Err(infeasible(e)),
        },
        Some(h @ JoinHint::UseHash(_)) => match (hash, nested) {
            (Some(hj), _) => hj,
            (None, Ok(nl)) => {
                let reason = if ctx.config.hash_join_enabled {
                    "hash join is not feasible"
                } else {
                    "hash join is disabled"
                };
                violations.push(HintViolation::new(alias, h.to_string(), reason));
                nl
            }
            (None, Err(e)) => return Err(infeasible(e)),
        },
        None => match (hash, nested) {
            (Some(hj), Ok(nl)) => cheaper(ctx, alias, hj, nl),
            (Some(hj), Err(_)) => hj,
            (None, Ok(nl)) => nl,
            (None, Err(e)) => return Err(infeasible(e)),
        },
    };

    log_event(
        PlanEvent::JoinMethodChosen,
        &[("alias", alias), ("method", method_name(chosen.method))],
    );
    violations.append(&mut chosen.violations);
    chosen.violations = violations;
    Ok(chosen)
}

/// Hash wins only when strictly cheaper. Missing costs keep the nested
/// loop.
fn cheaper(ctx: &JoinContext<'_>, alias: &str, hash: JoinBranch, nested: JoinBranch) -> JoinBranch {
    match (hash.state.cost(), nested.state.cost()) {
        (Some(h), Some(n)) => {
            if ctx.comparable(&h) < ctx.comparable(&n) {
                hash
            } else {
                nested
            }
        }
        _ => {
            log_event(
                PlanEvent::CostUnavailable,
                &[("alias", alias), ("reason", "no join cost")],
            );
            nested
        }
    }
}
