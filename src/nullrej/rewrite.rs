//! Outer join to inner join rewrite

use serde::Serialize;

use crate::expr::Expr;
use crate::observability::{log_event, PlanEvent};
use crate::planner::{FromTerm, PlannerResult};
use crate::registry::FilterRegistry;

use super::NullRejection;

/// An outer join, nest or unnest that became inner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewrittenJoin {
    pub alias: String,
    /// ON clause that is now an ordinary pushable predicate
    pub onclause: Option<Expr>,
    pub kind: &'static str,
}

/// One pass over the FROM tree, left to right.
///
/// An outer term becomes inner when a WHERE or inner ON fragment filed
/// under its alias (or an unnest of it) is null-rejecting. The alias and
/// its dependent unnests drop one outer level. Callers classify the
/// returned ON clauses and repeat until a pass rewrites nothing, since
/// each newly pushed ON clause may enable the next rewrite.
pub fn rewrite_outer_joins(
    from: &mut FromTerm,
    registry: &mut FilterRegistry,
) -> PlannerResult<Vec<RewrittenJoin>> {
    let mut out = Vec::new();
    visit(from, registry, &mut out)?;
    Ok(out)
}

fn visit(
    term: &mut FromTerm,
    registry: &mut FilterRegistry,
    out: &mut Vec<RewrittenJoin>,
) -> PlannerResult<()> {
    match term {
        FromTerm::Join(join) => {
            visit(&mut join.left, registry, out)?;
            if join.outer {
                let alias = join.right.alias().to_string();
                if rejected(&alias, registry)? {
                    join.outer = false;
                    lower_outer_level(&alias, registry)?;
                    let kind = if join.nest { "nest" } else { "join" };
                    log_event(
                        PlanEvent::OuterJoinRewritten,
                        &[("alias", alias.as_str()), ("kind", kind)],
                    );
                    out.push(RewrittenJoin {
                        alias,
                        onclause: join.onclause.clone(),
                        kind,
                    });
                }
            }
        }
        FromTerm::Unnest(unnest) => {
            visit(&mut unnest.left, registry, out)?;
            if unnest.outer && rejected(&unnest.alias, registry)? {
                unnest.outer = false;
                lower_outer_level(&unnest.alias, registry)?;
                log_event(
                    PlanEvent::OuterJoinRewritten,
                    &[("alias", unnest.alias.as_str()), ("kind", "unnest")],
                );
                out.push(RewrittenJoin {
                    alias: unnest.alias.clone(),
                    onclause: None,
                    kind: "unnest",
                });
            }
        }
        FromTerm::Keyspace(_) | FromTerm::Expression(_) | FromTerm::Subquery(_) => {}
    }
    Ok(())
}

fn rejected(alias: &str, registry: &FilterRegistry) -> PlannerResult<bool> {
    let source = registry.get(alias)?;
    let mut names: Vec<&str> = vec![alias];
    names.extend(source.unnests.iter().map(String::as_str));
    let analyzer = NullRejection::new(names.iter().copied());

    for name in names {
        let s = registry.get(name)?;
        let hit = s
            .filters
            .iter()
            .chain(s.join_filters.iter())
            .filter(|f| !f.is_onclause())
            .any(|f| analyzer.check(f.expr()));
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}

fn lower_outer_level(alias: &str, registry: &mut FilterRegistry) -> PlannerResult<()> {
    let unnests: Vec<String> = registry.get(alias)?.unnests.iter().cloned().collect();
    for name in std::iter::once(alias.to_string()).chain(unnests) {
        let source = registry.get_mut(&name)?;
        source.outer_level = source.outer_level.saturating_sub(1);
    }
    Ok(())
}
