//! Local predicate normalization
//!
//! Pushes NOT down to the leaves, rewrites BETWEEN and prefix LIKE into
//! range comparisons, and flattens AND/OR with constant folding. It never
//! merges across sibling predicates. OR-over-AND distribution into DNF is
//! optional and bounded.

use serde_json::Value;

use crate::expr::{and_all, like_successor, or_all, Datum, Expr};

/// NOT IN over a literal list longer than this stays a NOT.
const NOT_IN_EXPANSION_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    like: bool,
    distribute: bool,
    max_complexity: usize,
}

impl Normalizer {
    pub fn new(like: bool, distribute: bool, max_complexity: usize) -> Self {
        Self {
            like,
            distribute,
            max_complexity,
        }
    }

    /// Classifier flavour: LIKE rewriting on, no distribution.
    pub fn local(max_complexity: usize) -> Self {
        Self::new(true, false, max_complexity)
    }

    /// Full DNF: distribution on, bounded by `max_complexity` terms.
    pub fn dnf(max_complexity: usize) -> Self {
        Self::new(true, true, max_complexity)
    }

    pub fn normalize(&self, e: &Expr) -> Expr {
        match e {
            Expr::Between(x, low, high) => {
                let x = self.normalize(x);
                self.normalize(&Expr::And(vec![
                    Expr::Le(Box::new(self.normalize(low)), Box::new(x.clone())),
                    Expr::Le(Box::new(x), Box::new(self.normalize(high))),
                ]))
            }
            Expr::Not(inner) => self.negate(&self.normalize(inner)),
            Expr::And(ops) => self.normalize_and(ops),
            Expr::Or(ops) => self.normalize_or(ops),
            Expr::Like(x, pattern) if self.like => self.like_range(x, pattern).unwrap_or_else(|| e.clone()),
            _ => e.clone(),
        }
    }

    fn normalize_and(&self, ops: &[Expr]) -> Expr {
        let mut terms: Vec<Expr> = Vec::with_capacity(ops.len());
        for op in ops {
            match self.normalize(op) {
                Expr::And(inner) => terms.extend(inner),
                other => match other.static_truth() {
                    Some(true) => {}
                    Some(false) => return Expr::Constant(Value::Bool(false)),
                    None => terms.push(other),
                },
            }
        }
        let conjunction = match and_all(terms) {
            Some(e) => e,
            None => return Expr::Constant(Value::Bool(true)),
        };
        if self.distribute {
            if let Some(dnf) = self.distribute_and(&conjunction) {
                return dnf;
            }
        }
        conjunction
    }

    fn normalize_or(&self, ops: &[Expr]) -> Expr {
        let mut terms: Vec<Expr> = Vec::with_capacity(ops.len());
        for op in ops {
            match self.normalize(op) {
                Expr::Or(inner) => terms.extend(inner),
                other => match other.static_truth() {
                    Some(true) => return Expr::Constant(Value::Bool(true)),
                    Some(false) => {}
                    None => terms.push(other),
                },
            }
        }
        or_all(terms).unwrap_or(Expr::Constant(Value::Bool(false)))
    }

    /// `A AND (B OR C)` into `(A AND B) OR (A AND C)`, unless that would
    /// produce more than `max_complexity` terms.
    fn distribute_and(&self, conjunction: &Expr) -> Option<Expr> {
        let ops = match conjunction {
            Expr::And(ops) => ops,
            _ => return None,
        };
        if !ops.iter().any(|op| matches!(op, Expr::Or(_))) {
            return None;
        }
        let mut size: usize = 1;
        for op in ops {
            size = size.checked_mul(op.disjuncts().len())?;
            if size > self.max_complexity {
                return None;
            }
        }
        let mut products: Vec<Vec<Expr>> = vec![Vec::new()];
        for op in ops {
            let mut next = Vec::with_capacity(products.len());
            for prefix in &products {
                for d in op.disjuncts() {
                    let mut term = prefix.clone();
                    term.extend(d.conjuncts().into_iter().cloned());
                    next.push(term);
                }
            }
            products = next;
        }
        let terms = products
            .into_iter()
            .filter_map(and_all)
            .collect::<Vec<_>>();
        or_all(terms)
    }

    /// NOT of an already normalized expression.
    fn negate(&self, e: &Expr) -> Expr {
        match e {
            Expr::Not(inner) => (**inner).clone(),
            Expr::And(ops) => self.normalize(&Expr::Or(
                ops.iter().map(|op| Expr::Not(Box::new(op.clone()))).collect(),
            )),
            Expr::Or(ops) => self.normalize(&Expr::And(
                ops.iter().map(|op| Expr::Not(Box::new(op.clone()))).collect(),
            )),
            Expr::Eq(a, b) => Expr::Or(vec![
                Expr::Lt(a.clone(), b.clone()),
                Expr::Lt(b.clone(), a.clone()),
            ]),
            Expr::Lt(a, b) => Expr::Le(b.clone(), a.clone()),
            Expr::Le(a, b) => Expr::Lt(b.clone(), a.clone()),
            Expr::IsMissing(x) => Expr::IsNotMissing(x.clone()),
            Expr::IsNotMissing(x) => Expr::IsMissing(x.clone()),
            Expr::IsNull(x) => Expr::IsNotNull(x.clone()),
            Expr::IsNotNull(x) => Expr::IsNull(x.clone()),
            Expr::IsValued(x) => Expr::IsNotValued(x.clone()),
            Expr::IsNotValued(x) => Expr::IsValued(x.clone()),
            Expr::In(x, list) => match list.static_value() {
                Some(Datum::Value(Value::Array(items)))
                    if !items.is_empty() && items.len() <= NOT_IN_EXPANSION_LIMIT =>
                {
                    self.normalize(&Expr::And(
                        items
                            .into_iter()
                            .map(|v| {
                                Expr::Not(Box::new(Expr::Eq(x.clone(), Box::new(Expr::Constant(v)))))
                            })
                            .collect(),
                    ))
                }
                _ => Expr::Not(Box::new(e.clone())),
            },
            other => match other.static_value() {
                Some(Datum::Value(Value::Bool(b))) => Expr::Constant(Value::Bool(!b)),
                _ => Expr::Not(Box::new(other.clone())),
            },
        }
    }

    /// LIKE with a literal pattern:
    /// - no wildcard: equality
    /// - `prefix%`: `prefix <= x < successor(prefix)`
    ///
    /// Any other pattern stays a LIKE; sargability derives its prefix range.
    fn like_range(&self, x: &Expr, pattern: &Expr) -> Option<Expr> {
        let text = match pattern {
            Expr::Constant(Value::String(s)) => s,
            _ => return None,
        };
        let (prefix, rest) = like_prefix(text);
        if rest.is_none() {
            return Some(Expr::Eq(
                Box::new(x.clone()),
                Box::new(Expr::Constant(Value::String(prefix))),
            ));
        }
        if prefix.is_empty() || rest.as_deref() != Some("%") {
            return None;
        }
        let low = Expr::Le(
            Box::new(Expr::Constant(Value::String(prefix.clone()))),
            Box::new(x.clone()),
        );
        let mut terms = vec![low];
        if let Some(next) = like_successor(&prefix) {
            terms.push(Expr::Lt(
                Box::new(x.clone()),
                Box::new(Expr::Constant(Value::String(next))),
            ));
        }
        and_all(terms)
    }
}

/// Splits a LIKE pattern into its unescaped literal prefix and the
/// remainder starting at the first wildcard (`None` if there is none).
pub fn like_prefix(pattern: &str) -> (String, Option<String>) {
    let mut prefix = String::new();
    let mut chars = pattern.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => prefix.push(escaped),
                None => prefix.push('\\'),
            },
            '%' | '_' => return (prefix, Some(pattern[i..].to_string())),
            other => prefix.push(other),
        }
    }
    (prefix, None)
}
