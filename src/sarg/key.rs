//! Sargability of a predicate against one index key

use regex_syntax::hir::literal::{ExtractKind, Extractor, Literal};
use regex_syntax::Parser;
use serde_json::Value;

use crate::catalog::{ArrayKey, IndexKey};
use crate::classify::like_prefix;
use crate::expr::{like_successor, Datum, Expr};

use super::span::{above_null, Bound, Range, Span};
use super::spans::SargSpans;

/// Derives the spans one index key can use for a predicate.
///
/// `None` means the predicate has no relation to the key. `Full` means it
/// depends on the key without bounding it.
#[derive(Debug, Clone)]
pub struct KeySarger<'a> {
    key: &'a Expr,
    /// Names whose values are unknown until the scan runs: the alias being
    /// scanned and any array-key variable
    local: Vec<String>,
    fanout_limit: usize,
}

impl<'a> KeySarger<'a> {
    pub fn new(key: &'a Expr, alias: &str, fanout_limit: usize) -> Self {
        Self {
            key,
            local: vec![alias.to_string()],
            fanout_limit,
        }
    }

    /// Entry point for an index key, scalar or array.
    pub fn sarg_index_key(key: &'a IndexKey, alias: &str, fanout_limit: usize, pred: &Expr) -> Option<SargSpans> {
        let sarger = Self::new(&key.expr, alias, fanout_limit);
        match &key.array {
            None => sarger.sarg(pred),
            Some(array) => sarger.with_local(&array.variable).sarg_array(pred, array),
        }
    }

    fn with_local(mut self, name: &str) -> Self {
        self.local.push(name.to_string());
        self
    }

    pub fn sarg(&self, pred: &Expr) -> Option<SargSpans> {
        if pred == self.key {
            return Some(exact(Range::point(Expr::Constant(Value::Bool(true)))));
        }
        if !pred.contains(self.key) {
            return None;
        }
        let spans = match pred {
            Expr::And(ops) => return self.sarg_and(ops),
            Expr::Or(ops) => return self.sarg_or(ops),
            Expr::Eq(a, b) => self
                .keyed(a, b)
                .map(|bound| self.equal(bound))
                .or_else(|| self.keyed(b, a).map(|bound| self.equal(bound))),
            Expr::Lt(a, b) => self
                .keyed(a, b)
                .map(|bound| self.below(bound, false))
                .or_else(|| self.keyed(b, a).map(|bound| self.above(bound, false))),
            Expr::Le(a, b) => self
                .keyed(a, b)
                .map(|bound| self.below(bound, true))
                .or_else(|| self.keyed(b, a).map(|bound| self.above(bound, true))),
            Expr::Between(x, low, high) => {
                if **x == *self.key && self.can_bound(low) && self.can_bound(high) {
                    Some(self.between(low, high))
                } else {
                    None
                }
            }
            Expr::Like(x, pattern) => self.keyed(x, pattern).map(|p| self.like(p)),
            Expr::RegexpLike(x, pattern) => self.keyed(x, pattern).map(|p| self.regexp(p)),
            Expr::In(x, list) => self.keyed(x, list).map(|l| self.in_list(l)),
            Expr::Within(x, coll) => self.keyed(x, coll).map(|c| self.within(c)),
            Expr::IsNull(x) if **x == *self.key => {
                Some(exact(Range::point(Expr::Constant(Value::Null))))
            }
            Expr::IsNotNull(x) | Expr::IsValued(x) if **x == *self.key => {
                Some(exact(Range::new(above_null(), Bound::Unbounded)))
            }
            Expr::IsNotMissing(x) if **x == *self.key => Some(exact(Range::new(
                Bound::Included(Expr::Constant(Value::Null)),
                Bound::Unbounded,
            ))),
            Expr::IsMissing(x) | Expr::IsNotValued(x) if **x == *self.key => Some(SargSpans::Whole),
            _ => None,
        };
        Some(spans.unwrap_or_else(|| self.unbounded(pred)))
    }

    /// `operand` is the key and `other` can bound it.
    fn keyed<'e>(&self, operand: &Expr, other: &'e Expr) -> Option<&'e Expr> {
        if operand == self.key && self.can_bound(other) {
            Some(other)
        } else {
            None
        }
    }

    /// The value is known before the scan starts: constants, parameters,
    /// and expressions over already planned sources.
    fn can_bound(&self, e: &Expr) -> bool {
        !e.has_subquery()
            && !e.contains(self.key)
            && !e
                .free_identifiers()
                .iter()
                .any(|id| self.local.contains(id))
    }

    fn sarg_and(&self, ops: &[Expr]) -> Option<SargSpans> {
        let mut acc: Option<SargSpans> = None;
        let mut exact_all = true;
        for op in ops {
            let spans = match self.sarg(op) {
                Some(s) => s,
                None => continue,
            };
            acc = Some(match acc {
                None => spans,
                Some(prev) => self.constrain(&prev, &spans),
            });
            if acc == Some(SargSpans::Empty) {
                return acc;
            }
            exact_all &= acc.as_ref().map_or(true, SargSpans::is_exact);
        }
        let acc = acc?;
        Some(if exact_all { acc } else { acc.inexact() })
    }

    /// AND of two single-key span sets.
    fn constrain(&self, a: &SargSpans, b: &SargSpans) -> SargSpans {
        match (a, b) {
            (SargSpans::Empty, _) | (_, SargSpans::Empty) => SargSpans::Empty,
            (SargSpans::ExactFull, other) | (other, SargSpans::ExactFull) => other.clone(),
            (SargSpans::Full, other) | (other, SargSpans::Full) => other.inexact(),
            (SargSpans::Whole, other) | (other, SargSpans::Whole) => other.inexact(),
            (SargSpans::Term(xs), SargSpans::Term(ys)) => {
                if xs.len().saturating_mul(ys.len()) > self.fanout_limit {
                    return SargSpans::Full;
                }
                let mut out = Vec::with_capacity(xs.len() * ys.len());
                for x in xs {
                    for y in ys {
                        if let Some(span) = x.intersect(y) {
                            out.push(span);
                        }
                    }
                }
                SargSpans::Term(out).streamline()
            }
            _ => SargSpans::intersect(vec![a.clone(), b.clone()]),
        }
    }

    fn sarg_or(&self, ops: &[Expr]) -> Option<SargSpans> {
        let mut spans: Vec<Span> = Vec::new();
        let mut related = false;
        let mut unconstrained: Option<SargSpans> = None;
        for op in ops {
            match self.sarg(op) {
                None => unconstrained = Some(SargSpans::Full),
                Some(s) => {
                    related = true;
                    match s {
                        SargSpans::Empty => {}
                        SargSpans::Term(ts) => spans.extend(ts),
                        other => {
                            if unconstrained.is_none() {
                                unconstrained = Some(other.inexact());
                            }
                        }
                    }
                }
            }
        }
        if !related {
            return None;
        }
        if let Some(full) = unconstrained {
            return Some(full);
        }
        if spans.len() > self.fanout_limit {
            return Some(SargSpans::Full);
        }
        Some(SargSpans::Term(spans).streamline())
    }

    fn equal(&self, value: &Expr) -> SargSpans {
        match static_bound(value) {
            Some(None) => SargSpans::Empty,
            Some(Some(v)) => exact(Range::point(Expr::Constant(v))),
            None => exact(Range::point(value.clone())),
        }
    }

    /// `key < value` or `key <= value`
    fn below(&self, value: &Expr, inclusive: bool) -> SargSpans {
        match static_bound(value) {
            Some(None) => SargSpans::Empty,
            Some(Some(v)) => exact(Range::new(above_null(), end(Expr::Constant(v), inclusive))),
            None => exact(Range::new(above_null(), end(value.clone(), inclusive))),
        }
    }

    /// `value < key` or `value <= key`
    fn above(&self, value: &Expr, inclusive: bool) -> SargSpans {
        match static_bound(value) {
            Some(None) => SargSpans::Empty,
            Some(Some(v)) => exact(Range::new(end(Expr::Constant(v), inclusive), Bound::Unbounded)),
            None => exact(Range::new(end(value.clone(), inclusive), Bound::Unbounded)),
        }
    }

    fn between(&self, low: &Expr, high: &Expr) -> SargSpans {
        let low = match static_bound(low) {
            Some(None) => return SargSpans::Empty,
            Some(Some(v)) => Expr::Constant(v),
            None => low.clone(),
        };
        let high = match static_bound(high) {
            Some(None) => return SargSpans::Empty,
            Some(Some(v)) => Expr::Constant(v),
            None => high.clone(),
        };
        SargSpans::Term(vec![Span::single(
            Range::new(Bound::Included(low), Bound::Included(high)),
            true,
        )])
        .streamline()
    }

    fn like(&self, pattern: &Expr) -> SargSpans {
        let text = match static_bound(pattern) {
            Some(Some(Value::String(s))) => s,
            Some(_) => return SargSpans::Empty,
            None => return strings(false),
        };
        let (prefix, rest) = like_prefix(&text);
        prefix_range(prefix, rest.as_deref() == Some("%"), rest.is_none())
    }

    /// REGEXP_LIKE matches the whole value. A pattern whose matches form a
    /// finite set of literals becomes exact points; otherwise every literal
    /// prefix a match can start with bounds one range.
    fn regexp(&self, pattern: &Expr) -> SargSpans {
        let text = match static_bound(pattern) {
            Some(Some(Value::String(s))) => s,
            Some(_) => return SargSpans::Empty,
            None => return strings(false),
        };
        let hir = match Parser::new().parse(&text) {
            Ok(hir) => hir,
            Err(_) => return SargSpans::Full,
        };
        let seq = Extractor::new().kind(ExtractKind::Prefix).extract(&hir);
        let literals = match seq.literals() {
            Some([]) => return SargSpans::Empty,
            Some(literals) if literals.len() <= self.fanout_limit => literals,
            _ => return SargSpans::Full,
        };

        let mut prefixes: Vec<(String, bool)> = literals.iter().map(literal_text).collect();
        prefixes.sort();
        prefixes.dedup();

        // a range on "ab" already holds every value starting with "abc"
        let mut kept: Vec<(String, bool)> = Vec::with_capacity(prefixes.len());
        for (prefix, whole) in prefixes {
            if !whole && prefix.is_empty() {
                return SargSpans::Full;
            }
            if kept.iter().any(|(k, k_whole)| !k_whole && prefix.starts_with(k.as_str())) {
                continue;
            }
            kept.push((prefix, whole));
        }

        let spans = kept
            .into_iter()
            .map(|(prefix, whole)| {
                if whole {
                    Span::single(Range::point(Expr::Constant(Value::String(prefix))), true)
                } else {
                    prefix_span(prefix, false)
                }
            })
            .collect();
        SargSpans::Term(spans)
    }

    fn in_list(&self, list: &Expr) -> SargSpans {
        match static_bound(list) {
            Some(Some(Value::Array(items))) => {
                let points = sorted_points(items.into_iter());
                if points.is_empty() {
                    return SargSpans::Full;
                }
                if points.len() > self.fanout_limit {
                    return SargSpans::Full;
                }
                SargSpans::Term(
                    points
                        .into_iter()
                        .map(|v| Span::single(Range::point(Expr::Constant(v)), true))
                        .collect(),
                )
            }
            Some(_) => SargSpans::Empty,
            None => SargSpans::Term(vec![Span::single(
                Range::new(
                    Bound::Included(Expr::Function("ARRAY_MIN".into(), vec![list.clone()])),
                    Bound::Included(Expr::Function("ARRAY_MAX".into(), vec![list.clone()])),
                ),
                false,
            )]),
        }
    }

    fn within(&self, collection: &Expr) -> SargSpans {
        match static_bound(collection) {
            Some(Some(v @ Value::Array(_))) | Some(Some(v @ Value::Object(_))) => {
                let mut scalars = Vec::new();
                let mut nested = false;
                descendant_scalars(&v, &mut scalars, &mut nested);
                let points = sorted_points(scalars.into_iter());
                if points.is_empty() {
                    return if nested { SargSpans::Full } else { SargSpans::Empty };
                }
                if points.len() > self.fanout_limit {
                    return SargSpans::Full;
                }
                SargSpans::Term(
                    points
                        .into_iter()
                        .map(|v| Span::single(Range::point(Expr::Constant(v)), !nested))
                        .collect(),
                )
            }
            Some(_) => SargSpans::Empty,
            None => SargSpans::Full,
        }
    }

    /// A predicate that mentions the key without bounding it. When it
    /// evaluates to MISSING or NULL for a MISSING or NULL key, entries
    /// above NULL still suffice.
    fn unbounded(&self, pred: &Expr) -> SargSpans {
        if self.rejects_null(pred) {
            SargSpans::Term(vec![Span::single(Range::new(above_null(), Bound::Unbounded), false)])
        } else {
            SargSpans::Full
        }
    }

    fn rejects_null(&self, pred: &Expr) -> bool {
        let operands: Vec<&Expr> = match pred {
            Expr::Eq(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b)
            | Expr::Like(a, b)
            | Expr::RegexpLike(a, b)
            | Expr::In(a, b)
            | Expr::Within(a, b) => vec![&**a, &**b],
            Expr::Between(a, b, c) => vec![&**a, &**b, &**c],
            Expr::IsNotNull(x) | Expr::IsValued(x) => vec![&**x],
            _ => return false,
        };
        let keyed: Vec<&Expr> = operands.into_iter().filter(|op| op.contains(self.key)).collect();
        !keyed.is_empty() && keyed.into_iter().all(|op| self.propagates_null(op))
    }

    fn propagates_null(&self, e: &Expr) -> bool {
        if e == self.key {
            return true;
        }
        match e {
            Expr::Field(base, _) | Expr::Neg(base) => self.propagates_null(base),
            Expr::Element(a, b) | Expr::Sub(a, b) | Expr::Div(a, b) | Expr::Mod(a, b) => {
                [a, b]
                    .iter()
                    .filter(|op| op.contains(self.key))
                    .all(|op| self.propagates_null(op))
            }
            Expr::Add(ops) | Expr::Mult(ops) => ops
                .iter()
                .filter(|op| op.contains(self.key))
                .all(|op| self.propagates_null(op)),
            _ => false,
        }
    }

    /// Array keys: ANY over the indexed array narrows by element. A top
    /// level AND may constrain different elements, so its parts are
    /// combined as alternatives and the result is never exact.
    fn sarg_array(&self, pred: &Expr, array: &ArrayKey) -> Option<SargSpans> {
        match pred {
            Expr::And(ops) | Expr::Or(ops) => {
                let is_and = matches!(pred, Expr::And(_));
                let parts: Vec<SargSpans> = ops
                    .iter()
                    .filter_map(|op| self.sarg_array(op, array))
                    .collect();
                if parts.is_empty() {
                    return None;
                }
                let mut spans = Vec::new();
                let mut full = false;
                for part in parts {
                    match part {
                        SargSpans::Term(ts) => spans.extend(ts),
                        SargSpans::Empty if is_and => return Some(SargSpans::Empty),
                        SargSpans::Empty => {}
                        _ => full = true,
                    }
                }
                if full || spans.len() > self.fanout_limit {
                    return Some(SargSpans::Full);
                }
                let combined = SargSpans::Term(spans).streamline();
                Some(if is_and { combined.inexact() } else { combined })
            }
            Expr::Any(q) | Expr::AnyEvery(q) => {
                if q.bindings.len() != 1 || q.bindings[0].expr != array.source {
                    return None;
                }
                let from = Expr::Identifier(q.bindings[0].variable.clone());
                let to = Expr::Identifier(array.variable.clone());
                let satisfies = q.satisfies.replace(&from, &to);
                let spans = self.sarg(&satisfies)?;
                Some(if matches!(pred, Expr::AnyEvery(_)) {
                    spans.inexact()
                } else {
                    spans
                })
            }
            _ => None,
        }
    }
}

fn exact(range: Range) -> SargSpans {
    SargSpans::Term(vec![Span::single(range, true)])
}

fn end(e: Expr, inclusive: bool) -> Bound {
    if inclusive {
        Bound::Included(e)
    } else {
        Bound::Excluded(e)
    }
}

/// `None` for a dynamic expression, `Some(None)` for a static MISSING or
/// NULL (which no comparison accepts), `Some(Some(v))` for a static value.
fn static_bound(e: &Expr) -> Option<Option<Value>> {
    if !e.is_static() {
        return None;
    }
    match e.static_value() {
        None => None,
        Some(Datum::Missing) | Some(Datum::Value(Value::Null)) => Some(None),
        Some(Datum::Value(v)) => Some(Some(v)),
    }
}

/// Every string value.
fn strings(exact: bool) -> SargSpans {
    SargSpans::Term(vec![Span::single(
        Range::new(
            Bound::Included(Expr::Constant(Value::String(String::new()))),
            Bound::Excluded(Expr::Constant(Value::Array(Vec::new()))),
        ),
        exact,
    )])
}

/// Range covering every string starting with `prefix`. `literal` means
/// the pattern is the prefix itself.
fn prefix_range(prefix: String, exact_prefix: bool, literal: bool) -> SargSpans {
    if literal {
        return exact(Range::point(Expr::Constant(Value::String(prefix))));
    }
    if prefix.is_empty() {
        return SargSpans::Full;
    }
    SargSpans::Term(vec![prefix_span(prefix, exact_prefix)])
}

fn prefix_span(prefix: String, exact: bool) -> Span {
    let high = match like_successor(&prefix) {
        Some(next) => Bound::Excluded(Expr::Constant(Value::String(next))),
        None => Bound::Excluded(Expr::Constant(Value::Array(Vec::new()))),
    };
    Span::single(
        Range::new(Bound::Included(Expr::Constant(Value::String(prefix))), high),
        exact,
    )
}

/// Text of an extracted literal and whether it is a complete match. A
/// literal cut inside a UTF-8 sequence keeps its valid part as a prefix.
fn literal_text(literal: &Literal) -> (String, bool) {
    let bytes = literal.as_bytes();
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), literal.is_exact()),
        Err(e) => (
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned(),
            false,
        ),
    }
}

/// Distinct non-null values in collation order.
fn sorted_points<I: Iterator<Item = Value>>(values: I) -> Vec<Value> {
    let mut points: Vec<Value> = values.filter(|v| !v.is_null()).collect();
    points.sort_by(crate::expr::collate);
    points.dedup_by(|a, b| crate::expr::collate(a, b) == std::cmp::Ordering::Equal);
    points
}

fn descendant_scalars(v: &Value, out: &mut Vec<Value>, nested: &mut bool) {
    let children: Vec<&Value> = match v {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return,
    };
    for child in children {
        match child {
            Value::Array(_) | Value::Object(_) => {
                *nested = true;
                descendant_scalars(child, out, nested);
            }
            scalar => out.push(scalar.clone()),
        }
    }
}
