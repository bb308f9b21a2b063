//! Ranges over one index key and composite spans

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::expr::{collate_datum, Datum, Expr};

/// One end of a range.
///
/// Bounds are expressions. A static bound folds to a constant; a dynamic
/// one (a parameter, or a value from an already joined source) is only
/// known at execution time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Unbounded,
    Included(Expr),
    Excluded(Expr),
}

impl Bound {
    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Bound::Unbounded => None,
            Bound::Included(e) | Bound::Excluded(e) => Some(e),
        }
    }

    pub fn is_inclusive(&self) -> bool {
        matches!(self, Bound::Included(_))
    }

    fn datum(&self) -> Option<Datum> {
        self.expr().and_then(Expr::static_value)
    }
}

/// Bounds on a single key position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Range {
    pub low: Bound,
    pub high: Bound,
}

impl Range {
    pub fn new(low: Bound, high: Bound) -> Self {
        Self { low, high }
    }

    pub fn unbounded() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn point(value: Expr) -> Self {
        Self::new(Bound::Included(value.clone()), Bound::Included(value))
    }

    pub fn is_unbounded(&self) -> bool {
        self.low == Bound::Unbounded && self.high == Bound::Unbounded
    }

    /// Both ends inclusive on the same expression.
    pub fn is_point(&self) -> bool {
        match (&self.low, &self.high) {
            (Bound::Included(a), Bound::Included(b)) => a == b,
            _ => false,
        }
    }

    /// Provably selects nothing. Dynamic bounds are never empty.
    pub fn is_empty(&self) -> bool {
        let (low, high) = match (self.low.datum(), self.high.datum()) {
            (Some(l), Some(h)) => (l, h),
            _ => return false,
        };
        if low == Datum::Missing || high == Datum::Missing {
            return true;
        }
        match collate_datum(&low, &high) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.low.is_inclusive() && self.high.is_inclusive()),
            Ordering::Less => false,
        }
    }

    /// Intersection of two ranges on the same key.
    ///
    /// When two bounds cannot be compared (one is dynamic) the dynamic one
    /// is kept and the result is flagged inexact.
    pub fn intersect(&self, other: &Range) -> (Range, bool) {
        let (low, low_exact) = tighter(&self.low, &other.low, Ordering::Greater);
        let (high, high_exact) = tighter(&self.high, &other.high, Ordering::Less);
        (Range { low, high }, low_exact && high_exact)
    }

    /// True when the two ranges provably share no value.
    pub fn disjoint(&self, other: &Range) -> bool {
        self.intersect(other).0.is_empty()
    }
}

/// Picks the more restrictive of two bounds of the same side. `prefer` is
/// the ordering that makes the first bound the tighter one.
fn tighter(a: &Bound, b: &Bound, prefer: Ordering) -> (Bound, bool) {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => (other.clone(), true),
        _ => match (a.datum(), b.datum()) {
            (Some(x), Some(y)) => match collate_datum(&x, &y) {
                Ordering::Equal => {
                    if a.is_inclusive() {
                        (b.clone(), true)
                    } else {
                        (a.clone(), true)
                    }
                }
                ord if ord == prefer => (a.clone(), true),
                _ => (b.clone(), true),
            },
            (None, _) => (a.clone(), a == b),
            (_, None) => (b.clone(), false),
        },
    }
}

/// Lowest possible low bound for a comparison: every value above NULL.
///
/// Comparisons across types follow collation order, so a one-sided
/// comparison only excludes MISSING and NULL on its open side.
pub fn above_null() -> Bound {
    Bound::Excluded(Expr::Constant(Value::Null))
}

/// One composite span: a range per leading index key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub ranges: Vec<Range>,
    /// The span alone answers the predicate it was derived from
    pub exact: bool,
}

impl Span {
    pub fn new(ranges: Vec<Range>, exact: bool) -> Self {
        Self { ranges, exact }
    }

    pub fn single(range: Range, exact: bool) -> Self {
        Self::new(vec![range], exact)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.iter().any(Range::is_empty)
    }

    pub fn is_unbounded(&self) -> bool {
        self.ranges.iter().all(Range::is_unbounded)
    }

    /// Every key position is a single value.
    pub fn is_point(&self) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(Range::is_point)
    }

    /// Some key position is provably disjoint between the two spans.
    pub fn disjoint(&self, other: &Span) -> bool {
        self.ranges
            .iter()
            .zip(other.ranges.iter())
            .any(|(a, b)| a.disjoint(b))
    }

    /// Span extended with the ranges of `next` for the following keys.
    pub fn append(&self, next: &Span) -> Span {
        let mut ranges = self.ranges.clone();
        ranges.extend(next.ranges.iter().cloned());
        Span::new(ranges, self.exact && next.exact)
    }

    /// Position-wise intersection, `None` when the result is empty.
    pub fn intersect(&self, other: &Span) -> Option<Span> {
        let len = self.ranges.len().max(other.ranges.len());
        let mut ranges = Vec::with_capacity(len);
        let mut exact = self.exact && other.exact;
        for i in 0..len {
            let range = match (self.ranges.get(i), other.ranges.get(i)) {
                (Some(a), Some(b)) => {
                    let (r, decided) = a.intersect(b);
                    exact &= decided;
                    r
                }
                (Some(a), None) | (None, Some(a)) => a.clone(),
                (None, None) => Range::unbounded(),
            };
            ranges.push(range);
        }
        let span = Span::new(ranges, exact);
        if span.is_empty() {
            None
        } else {
            Some(span)
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Unbounded => write!(f, "*"),
            Bound::Included(e) | Bound::Excluded(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.low.is_inclusive() { '[' } else { '(' };
        let close = if self.high.is_inclusive() { ']' } else { ')' };
        write!(f, "{}{}, {}{}", open, self.low, self.high, close)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{{{}}}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant, param};
    use serde_json::json;

    fn c(v: Value) -> Expr {
        constant(v)
    }

    #[test]
    fn test_empty_ranges() {
        assert!(Range::new(Bound::Included(c(json!(5))), Bound::Included(c(json!(3)))).is_empty());
        assert!(Range::new(Bound::Included(c(json!(3))), Bound::Excluded(c(json!(3)))).is_empty());
        assert!(!Range::point(c(json!(3))).is_empty());
        assert!(!Range::new(Bound::Included(param("p")), Bound::Included(c(json!(3)))).is_empty());
    }

    #[test]
    fn test_intersect_static_ranges() {
        let a = Range::new(Bound::Included(c(json!(1))), Bound::Excluded(c(json!(10))));
        let b = Range::new(Bound::Excluded(c(json!(5))), Bound::Unbounded);
        let (r, exact) = a.intersect(&b);
        assert!(exact);
        assert_eq!(r.low, Bound::Excluded(c(json!(5))));
        assert_eq!(r.high, Bound::Excluded(c(json!(10))));
    }

    #[test]
    fn test_intersect_equal_bound_keeps_exclusive() {
        let a = Range::new(Bound::Included(c(json!(3))), Bound::Unbounded);
        let b = Range::new(Bound::Excluded(c(json!(3))), Bound::Unbounded);
        assert_eq!(a.intersect(&b).0.low, Bound::Excluded(c(json!(3))));
        assert_eq!(b.intersect(&a).0.low, Bound::Excluded(c(json!(3))));
    }

    #[test]
    fn test_intersect_dynamic_is_inexact() {
        let a = Range::new(Bound::Included(param("lo")), Bound::Unbounded);
        let b = Range::new(Bound::Included(c(json!(2))), Bound::Unbounded);
        let (r, exact) = a.intersect(&b);
        assert!(!exact);
        assert_eq!(r.low, Bound::Included(param("lo")));
    }

    #[test]
    fn test_above_null_excludes_null_only() {
        let r = Range::new(above_null(), Bound::Excluded(c(json!(5))));
        assert!(!r.is_empty());
        assert!(Range::new(above_null(), Bound::Included(c(Value::Null))).is_empty());
    }

    #[test]
    fn test_span_disjoint_and_display() {
        let a = Span::new(vec![Range::point(c(json!(1))), Range::point(c(json!(2)))], true);
        let b = Span::new(vec![Range::point(c(json!(3))), Range::point(c(json!(2)))], true);
        assert!(a.disjoint(&b));
        assert!(!a.disjoint(&a));
        assert_eq!(a.to_string(), "{[1, 1] [2, 2]}");
    }
}
