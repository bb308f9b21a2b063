//! Hash join attempt

use crate::catalog::{JoinMethod, JoinShape};
use crate::expr::Expr;
use crate::observability::{log_event, PlanEvent};
use crate::planner::{HashSide, HintViolation, JoinHint, PlannerResult};
use crate::registry::{FilterFlags, FilterRegistry};
use crate::sarg::ScanMode;

use super::{derived_scan, JoinBranch, JoinContext, JoinNode, PlanOp, PlanState};

/// Equality fragments usable as hash keys for `alias`.
///
/// A fragment qualifies when one operand reads only `alias` and the other
/// reads only already planned aliases. WHERE fragments on the outer side
/// of a join run after it and never qualify. Returns `(right, left)` key
/// lists of equal length.
pub fn equi_join_keys(
    registry: &FilterRegistry,
    alias: &str,
    planned: &[String],
) -> PlannerResult<(Vec<Expr>, Vec<Expr>)> {
    let pairs = key_pairs(registry, alias, planned)?;
    Ok(pairs.into_iter().map(|p| (p.right, p.left)).unzip())
}

struct KeyPair {
    filter: Expr,
    right: Expr,
    left: Expr,
}

fn key_pairs(registry: &FilterRegistry, alias: &str, planned: &[String]) -> PlannerResult<Vec<KeyPair>> {
    let source = registry.get(alias)?;
    let mut pairs = Vec::new();

    let keyed = source
        .filters
        .iter()
        .filter(|f| f.is_join() && !source.is_postjoin_filter(f));
    for filter in keyed {
        let (a, b) = match filter.expr() {
            Expr::Eq(a, b) => (&**a, &**b),
            _ => continue,
        };
        if a.has_subquery() || b.has_subquery() {
            continue;
        }
        let refs_a = a.referenced_aliases(registry.aliases());
        let refs_b = b.referenced_aliases(registry.aliases());
        let only_right = |refs: &std::collections::BTreeSet<String>| refs.len() == 1 && refs.contains(alias);
        let only_left = |refs: &std::collections::BTreeSet<String>| {
            !refs.is_empty() && refs.iter().all(|r| planned.contains(r))
        };
        let (right, left) = if only_right(&refs_a) && only_left(&refs_b) {
            (a, b)
        } else if only_right(&refs_b) && only_left(&refs_a) {
            (b, a)
        } else {
            continue;
        };
        pairs.push(KeyPair {
            filter: filter.expr().clone(),
            right: right.clone(),
            left: left.clone(),
        });
    }
    Ok(pairs)
}

/// Plans the right-hand term as the input of a hash join.
///
/// `Ok(None)` means no hash plan exists: the term is correlated, there is
/// no equality key, or the term has no standalone access path.
pub fn try_hash_join(
    ctx: &JoinContext<'_>,
    state: &PlanState,
    node: &JoinNode<'_>,
    hint: Option<JoinHint>,
) -> PlannerResult<Option<JoinBranch>> {
    let alias = node.right.alias();
    log_event(PlanEvent::JoinHashAttempt, &[("alias", alias)]);

    if node.right.is_correlated(state.planned()) {
        return Ok(None);
    }
    let pairs = key_pairs(state.registry(), alias, state.planned())?;
    if pairs.is_empty() {
        return Ok(None);
    }
    let key_filters: Vec<Expr> = pairs.iter().map(|p| p.filter.clone()).collect();
    let (right_keys, left_keys): (Vec<Expr>, Vec<Expr>) =
        pairs.into_iter().map(|p| (p.right, p.left)).unzip();

    let mut violations = Vec::new();
    let mut spanned = Vec::new();
    let (child, right_cost) = match derived_scan(node.right, state.planned()) {
        Some(scan) => (scan, None),
        None => {
            let source = state.registry().get(alias)?;
            let index_hints = node.right.hints().map(|h| h.index.as_slice()).unwrap_or(&[]);
            let built = ctx.scan_builder(alias).build(
                source,
                ScanMode::Standalone,
                index_hints,
                source.cached_document_count(),
            );
            match built {
                Ok(built) => {
                    violations.extend(built.violations);
                    spanned = built.spanned;
                    (built.plan, built.cost)
                }
                Err(e) if e.is_recoverable() => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    };

    let must_build_right = node.outer || node.nest;
    let build_right = match hint {
        Some(JoinHint::UseHash(HashSide::Build)) => true,
        Some(h @ JoinHint::UseHash(HashSide::Probe)) if must_build_right => {
            violations.push(HintViolation::new(
                alias,
                h.to_string(),
                "the right side of an outer join or nest must be the build side",
            ));
            true
        }
        Some(JoinHint::UseHash(HashSide::Probe)) => false,
        _ if must_build_right => true,
        _ => match (state.cost(), right_cost) {
            (Some(left), Some(right)) if ctx.cost_based() => right.cardinality <= left.cardinality,
            _ => true,
        },
    };

    let method = JoinMethod::Hash { build_right };
    let cost = ctx.oracle.and_then(|o| {
        o.join_cost(&JoinShape {
            alias,
            method,
            outer: node.outer,
            nest: node.nest,
            left: state.cost(),
            right: right_cost,
            onclause: node.onclause,
        })
    });

    let (build_exprs, probe_exprs) = if build_right {
        (right_keys, left_keys)
    } else {
        (left_keys, right_keys)
    };
    let op = PlanOp::HashJoin {
        alias: alias.to_string(),
        build_exprs,
        probe_exprs,
        build_right,
        outer: node.outer,
        nest: node.nest,
        child,
        onclause: node.onclause.cloned(),
    };
    let state = state
        .with_planned(op, Some(alias), cost)?
        .flag_filters(alias, &spanned, FilterFlags::INDEX_SPAN)?
        .flag_filters(alias, &key_filters, FilterFlags::HASH_JOIN)?;
    Ok(Some(JoinBranch {
        state,
        method,
        violations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::*;
    use crate::registry::{DataSource, Filter};
    use std::collections::BTreeSet;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn registry_with(e: Expr) -> FilterRegistry {
        outer_registry_with(e, 0, false)
    }

    fn outer_registry_with(e: Expr, outer_level: u32, onclause: bool) -> FilterRegistry {
        let mut r = FilterRegistry::new();
        r.insert(DataSource::keyspace("a", "orders")).unwrap();
        let mut b = DataSource::keyspace("b", "items");
        b.outer_level = outer_level;
        r.insert(b).unwrap();
        r.insert(DataSource::keyspace("c", "users")).unwrap();
        r.add_filter("b", Filter::new(e.clone(), e, set(&["b"]), set(&["a", "b"]), onclause))
            .unwrap();
        r
    }

    #[test]
    fn test_keys_oriented_right_then_left() {
        let r = registry_with(eq(path("a", "k"), path("b", "k")));
        let (right, left) = equi_join_keys(&r, "b", &["a".to_string()]).unwrap();
        assert_eq!(right, vec![path("b", "k")]);
        assert_eq!(left, vec![path("a", "k")]);
    }

    #[test]
    fn test_keys_require_planned_left_side() {
        let r = registry_with(eq(path("c", "k"), path("b", "k")));
        let (right, _) = equi_join_keys(&r, "b", &["a".to_string()]).unwrap();
        assert!(right.is_empty());
    }

    #[test]
    fn test_non_equality_is_not_a_key() {
        let r = registry_with(lt(path("a", "k"), path("b", "k")));
        let (right, _) = equi_join_keys(&r, "b", &["a".to_string()]).unwrap();
        assert!(right.is_empty());
    }

    #[test]
    fn test_mixed_operand_is_not_a_key() {
        let e = eq(Expr::Add(vec![path("a", "k"), path("b", "j")]), path("b", "k"));
        let r = registry_with(e);
        let (right, _) = equi_join_keys(&r, "b", &["a".to_string()]).unwrap();
        assert!(right.is_empty());
    }

    #[test]
    fn test_outer_side_where_fragment_is_not_a_key() {
        let e = eq(
            func("IFMISSING", vec![path("b", "y"), constant(serde_json::json!(0))]),
            path("a", "x"),
        );
        let r = outer_registry_with(e.clone(), 1, false);
        let (right, left) = equi_join_keys(&r, "b", &["a".to_string()]).unwrap();
        assert!(right.is_empty());
        assert!(left.is_empty());

        let r = outer_registry_with(e, 1, true);
        let (right, _) = equi_join_keys(&r, "b", &["a".to_string()]).unwrap();
        assert_eq!(right.len(), 1);
    }
}
