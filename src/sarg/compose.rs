//! Composite spans across the keys of one index

use serde_json::Value;

use crate::catalog::IndexKey;
use crate::expr::Expr;

use super::key::KeySarger;
use super::span::{Range, Span};
use super::spans::SargSpans;

/// Spans derived for one index from one predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSarg {
    pub spans: SargSpans,
    /// Leading keys that constrain the scan
    pub sarg_keys: usize,
    /// Conjuncts the spans do not fully answer
    pub uncovered: Vec<Expr>,
}

impl IndexSarg {
    /// The scan alone answers the predicate.
    pub fn is_exact(&self) -> bool {
        self.uncovered.is_empty() && self.spans.is_exact()
    }
}

/// Sargs `pred` against `keys` in order.
///
/// Returns `None` when the leading key is unrelated to the predicate. A
/// disjunction whose every branch constrains the leading key becomes a
/// union with one member per branch.
pub fn sarg_for(pred: &Expr, keys: &[IndexKey], alias: &str, fanout_limit: usize) -> Option<IndexSarg> {
    let disjuncts = pred.disjuncts();
    if disjuncts.len() > 1 {
        if let Some(sarg) = sarg_disjunction(pred, &disjuncts, keys, alias, fanout_limit) {
            return Some(sarg);
        }
    }
    sarg_conjunction(pred, keys, alias, fanout_limit)
}

fn sarg_disjunction(
    pred: &Expr,
    disjuncts: &[&Expr],
    keys: &[IndexKey],
    alias: &str,
    fanout_limit: usize,
) -> Option<IndexSarg> {
    let mut parts = Vec::with_capacity(disjuncts.len());
    for d in disjuncts {
        parts.push(sarg_conjunction(d, keys, alias, fanout_limit)?);
    }
    let sarg_keys = parts.iter().map(|p| p.sarg_keys).max().unwrap_or(0);
    let uncovered = if parts.iter().all(|p| p.uncovered.is_empty()) {
        Vec::new()
    } else {
        vec![pred.clone()]
    };

    // single-key branches read as one list of spans
    if sarg_keys == 1 && parts.iter().all(|p| matches!(p.spans, SargSpans::Term(_) | SargSpans::Empty)) {
        let mut spans = Vec::new();
        for part in parts {
            if let SargSpans::Term(ts) = part.spans {
                spans.extend(ts);
            }
        }
        let spans = if spans.len() > fanout_limit {
            SargSpans::Full
        } else {
            SargSpans::Term(spans).streamline()
        };
        return Some(IndexSarg {
            spans,
            sarg_keys,
            uncovered,
        });
    }

    let spans = SargSpans::union(parts.into_iter().map(|p| p.spans).collect());
    Some(IndexSarg {
        spans,
        sarg_keys,
        uncovered,
    })
}

/// Left to right over the keys, stopping at the first unrelated key.
fn sarg_conjunction(pred: &Expr, keys: &[IndexKey], alias: &str, fanout_limit: usize) -> Option<IndexSarg> {
    let mut composed = vec![Span::new(Vec::new(), true)];
    let mut sarged: Vec<&IndexKey> = Vec::new();
    let mut truncated = false;

    for (pos, key) in keys.iter().enumerate() {
        let spans = match KeySarger::sarg_index_key(key, alias, fanout_limit, pred) {
            Some(s) => s,
            None => break,
        };
        let next: Vec<Span> = match spans {
            SargSpans::Empty => {
                return Some(IndexSarg {
                    spans: SargSpans::Empty,
                    sarg_keys: pos + 1,
                    uncovered: Vec::new(),
                })
            }
            // the leading key must bound the scan; an index also holds no
            // entry for a MISSING leading key
            SargSpans::Full | SargSpans::Whole if pos == 0 => return None,
            SargSpans::Term(ts) => ts,
            SargSpans::ExactFull => vec![Span::single(Range::unbounded(), true)],
            _ => vec![Span::single(Range::unbounded(), false)],
        };
        if composed.len().saturating_mul(next.len()) > fanout_limit {
            truncated = true;
            break;
        }
        composed = composed
            .iter()
            .flat_map(|head| next.iter().map(move |tail| head.append(tail)))
            .collect();
        sarged.push(key);
    }

    if sarged.is_empty() {
        return None;
    }
    let mut spans = SargSpans::Term(composed).streamline();
    if truncated {
        spans = spans.inexact();
    }
    let uncovered = pred
        .conjuncts()
        .into_iter()
        .filter(|c| !sarged.iter().any(|k| answers(k, c, alias, fanout_limit)))
        .cloned()
        .collect();
    Some(IndexSarg {
        spans,
        sarg_keys: sarged.len(),
        uncovered,
    })
}

/// The key's spans alone decide `conjunct`: the sarg is exact and the
/// conjunct reads nothing of the source besides the key.
fn answers(key: &IndexKey, conjunct: &Expr, alias: &str, fanout_limit: usize) -> bool {
    let exact = KeySarger::sarg_index_key(key, alias, fanout_limit, conjunct)
        .map_or(false, |s| s.is_exact());
    if !exact {
        return false;
    }
    let residual = match (&key.array, conjunct) {
        (Some(array), Expr::Any(q)) if q.bindings.len() == 1 => {
            let from = Expr::Identifier(q.bindings[0].variable.clone());
            let to = Expr::Identifier(array.variable.clone());
            let satisfies = q.satisfies.replace(&from, &to);
            return !satisfies
                .replace(&key.expr, &Expr::Constant(Value::Null))
                .free_identifiers()
                .iter()
                .any(|id| id == alias || *id == array.variable);
        }
        _ => conjunct.replace(&key.expr, &Expr::Constant(Value::Null)),
    };
    !residual.references(alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::IndexKeyDef;
    use crate::expr::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<IndexKey> {
        names
            .iter()
            .map(|n| IndexKeyDef::scalar(ident(n)).formalize("a"))
            .collect()
    }

    fn c(v: serde_json::Value) -> Expr {
        constant(v)
    }

    #[test]
    fn test_composite_points() {
        let pred = and(vec![eq(path("a", "x"), c(json!(1))), eq(path("a", "y"), c(json!(2)))]);
        let sarg = sarg_for(&pred, &keys(&["x", "y"]), "a", 8192).unwrap();
        assert_eq!(sarg.sarg_keys, 2);
        assert!(sarg.is_exact());
        assert_eq!(sarg.spans.to_string(), "{[1, 1] [2, 2]}");
    }

    #[test]
    fn test_stops_at_unrelated_key() {
        let pred = and(vec![eq(path("a", "x"), c(json!(1))), eq(path("a", "z"), c(json!(2)))]);
        let sarg = sarg_for(&pred, &keys(&["x", "y", "z"]), "a", 8192).unwrap();
        assert_eq!(sarg.sarg_keys, 1);
        assert!(!sarg.is_exact());
        assert_eq!(sarg.uncovered, vec![eq(path("a", "z"), c(json!(2)))]);
    }

    #[test]
    fn test_leading_key_unrelated() {
        let pred = eq(path("a", "y"), c(json!(2)));
        assert!(sarg_for(&pred, &keys(&["x", "y"]), "a", 8192).is_none());
    }

    #[test]
    fn test_disjunction_of_composite_points_is_flat_union() {
        let pred = or(vec![
            and(vec![eq(path("a", "x"), c(json!(1))), eq(path("a", "y"), c(json!(2)))]),
            and(vec![eq(path("a", "x"), c(json!(3))), eq(path("a", "y"), c(json!(4)))]),
        ]);
        let sarg = sarg_for(&pred, &keys(&["x", "y"]), "a", 8192).unwrap();
        match &sarg.spans {
            SargSpans::Union(members) => {
                assert_eq!(members.len(), 2);
                assert!(members.iter().all(|m| matches!(m, SargSpans::Term(ts) if ts.len() == 1)));
            }
            other => panic!("expected union, got {}", other),
        }
        assert!(sarg.is_exact());
    }

    #[test]
    fn test_single_key_disjunction_is_one_term() {
        let pred = or(vec![eq(path("a", "x"), c(json!(2))), eq(path("a", "x"), c(json!(1)))]);
        let sarg = sarg_for(&pred, &keys(&["x"]), "a", 8192).unwrap();
        assert!(matches!(&sarg.spans, SargSpans::Term(ts) if ts.len() == 2));
    }

    #[test]
    fn test_fanout_limit_truncates() {
        let pred = and(vec![
            in_list(path("a", "x"), c(json!([1, 2, 3]))),
            in_list(path("a", "y"), c(json!([1, 2, 3]))),
        ]);
        let sarg = sarg_for(&pred, &keys(&["x", "y"]), "a", 4).unwrap();
        assert_eq!(sarg.sarg_keys, 1);
        assert_eq!(sarg.spans.size(), 3);
    }

    #[test]
    fn test_contradiction_is_empty() {
        let pred = and(vec![eq(path("a", "x"), c(json!(1))), eq(path("a", "x"), c(json!(2)))]);
        let sarg = sarg_for(&pred, &keys(&["x"]), "a", 8192).unwrap();
        assert_eq!(sarg.spans, SargSpans::Empty);
    }
}
