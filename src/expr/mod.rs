//! Expression tree consumed by every planning pass
//!
//! The variant set is closed. Classification, null-rejection and
//! sargability all match on it exhaustively, so a new operator cannot be
//! added without each pass deciding how to treat it.
//!
//! Values are plain `serde_json::Value`s. MISSING has no JSON form and is
//! carried by its own variant (`Expr::Missing`) and by [`Datum::Missing`]
//! when folded.

mod build;
mod collate;
mod display;

pub use build::*;
pub use collate::{collate, collate_datum, like_successor, truthy, Datum};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single `variable IN expr` binding of a quantified predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub variable: String,
    pub expr: Expr,
}

/// Bindings plus condition shared by ANY, EVERY and ANY AND EVERY.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantifier {
    pub bindings: Vec<Binding>,
    pub satisfies: Box<Expr>,
}

/// Query expression.
///
/// `>` and `>=` have no variant of their own; the builders swap operands
/// into [`Expr::Lt`] and [`Expr::Le`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Constant(Value),
    Missing,
    Identifier(String),
    Field(Box<Expr>, String),
    Element(Box<Expr>, Box<Expr>),
    /// `META(alias).id`, the document key of a data source.
    MetaId(String),
    Parameter(String),

    Add(Vec<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mult(Vec<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Concat(Vec<Expr>),

    ArrayConstruct(Vec<Expr>),
    ObjectConstruct(Vec<(String, Expr)>),
    Function(String, Vec<Expr>),
    RegexpLike(Box<Expr>, Box<Expr>),
    Case {
        whens: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },

    Eq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Between(Box<Expr>, Box<Expr>, Box<Expr>),
    Like(Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    Within(Box<Expr>, Box<Expr>),

    IsMissing(Box<Expr>),
    IsNotMissing(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    IsValued(Box<Expr>),
    IsNotValued(Box<Expr>),

    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),

    Any(Quantifier),
    Every(Quantifier),
    AnyEvery(Quantifier),
    Exists(Box<Expr>),

    /// Opaque subquery. `correlated_on` lists the outer aliases it reads.
    Subquery {
        text: String,
        correlated_on: Vec<String>,
    },
}

impl Expr {
    /// Direct sub-expressions, in operand order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant(_)
            | Expr::Missing
            | Expr::Identifier(_)
            | Expr::MetaId(_)
            | Expr::Parameter(_)
            | Expr::Subquery { .. } => Vec::new(),
            Expr::Field(base, _) => vec![&**base],
            Expr::Neg(e)
            | Expr::IsMissing(e)
            | Expr::IsNotMissing(e)
            | Expr::IsNull(e)
            | Expr::IsNotNull(e)
            | Expr::IsValued(e)
            | Expr::IsNotValued(e)
            | Expr::Not(e)
            | Expr::Exists(e) => vec![&**e],
            Expr::Element(a, b)
            | Expr::Sub(a, b)
            | Expr::Div(a, b)
            | Expr::Mod(a, b)
            | Expr::RegexpLike(a, b)
            | Expr::Eq(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b)
            | Expr::Like(a, b)
            | Expr::In(a, b)
            | Expr::Within(a, b) => vec![&**a, &**b],
            Expr::Between(a, b, c) => vec![&**a, &**b, &**c],
            Expr::Add(ops)
            | Expr::Mult(ops)
            | Expr::Concat(ops)
            | Expr::ArrayConstruct(ops)
            | Expr::Function(_, ops)
            | Expr::And(ops)
            | Expr::Or(ops) => ops.iter().collect(),
            Expr::ObjectConstruct(pairs) => pairs.iter().map(|(_, e)| e).collect(),
            Expr::Case { whens, otherwise } => {
                let mut out: Vec<&Expr> = Vec::with_capacity(whens.len() * 2 + 1);
                for (cond, result) in whens {
                    out.push(cond);
                    out.push(result);
                }
                if let Some(e) = otherwise {
                    out.push(e);
                }
                out
            }
            Expr::Any(q) | Expr::Every(q) | Expr::AnyEvery(q) => {
                let mut out: Vec<&Expr> = q.bindings.iter().map(|b| &b.expr).collect();
                out.push(&q.satisfies);
                out
            }
        }
    }

    /// Identifiers and `META()` aliases that are free in this expression.
    ///
    /// Quantifier variables are bound inside their own `SATISFIES` clause
    /// and in later bindings, and are not reported.
    pub fn free_identifiers(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match self {
            Expr::Identifier(name) => {
                if !bound.iter().any(|b| b == name) {
                    out.insert(name.clone());
                }
            }
            Expr::MetaId(alias) => {
                out.insert(alias.clone());
            }
            Expr::Subquery { correlated_on, .. } => {
                out.extend(correlated_on.iter().cloned());
            }
            Expr::Any(q) | Expr::Every(q) | Expr::AnyEvery(q) => {
                let depth = bound.len();
                for binding in &q.bindings {
                    binding.expr.collect_free(bound, out);
                    bound.push(binding.variable.clone());
                }
                q.satisfies.collect_free(bound, out);
                bound.truncate(depth);
            }
            _ => {
                for child in self.children() {
                    child.collect_free(bound, out);
                }
            }
        }
    }

    /// Aliases from `known` this expression references.
    pub fn referenced_aliases<'k, I>(&self, known: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'k String>,
    {
        let free = self.free_identifiers();
        known
            .into_iter()
            .filter(|alias| free.contains(*alias))
            .cloned()
            .collect()
    }

    pub fn references(&self, alias: &str) -> bool {
        self.free_identifiers().contains(alias)
    }

    /// True when the expression is `target` or has it as a sub-expression.
    pub fn contains(&self, target: &Expr) -> bool {
        self == target || self.children().into_iter().any(|c| c.contains(target))
    }

    /// Contains a subquery anywhere in the tree.
    pub fn has_subquery(&self) -> bool {
        matches!(self, Expr::Subquery { .. })
            || self.children().into_iter().any(|c| c.has_subquery())
    }

    /// No free identifiers and no subqueries: evaluates the same for every row.
    /// Parameters count as static.
    pub fn is_static(&self) -> bool {
        !self.has_subquery() && self.free_identifiers().is_empty()
    }

    /// Top-level conjuncts. A non-AND expression is its own single conjunct.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(ops) => ops.iter().flat_map(|op| op.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Top-level disjuncts. A non-OR expression is its own single disjunct.
    pub fn disjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Or(ops) => ops.iter().flat_map(|op| op.disjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Folds the expression to a value when every leaf is a literal.
    pub fn static_value(&self) -> Option<Datum> {
        match self {
            Expr::Constant(v) => Some(Datum::Value(v.clone())),
            Expr::Missing => Some(Datum::Missing),
            Expr::ArrayConstruct(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.static_value()? {
                        Datum::Value(v) => out.push(v),
                        Datum::Missing => {}
                    }
                }
                Some(Datum::Value(Value::Array(out)))
            }
            Expr::ObjectConstruct(pairs) => {
                let mut out = serde_json::Map::new();
                for (name, item) in pairs {
                    if let Datum::Value(v) = item.static_value()? {
                        out.insert(name.clone(), v);
                    }
                }
                Some(Datum::Value(Value::Object(out)))
            }
            Expr::Neg(e) => match e.static_value()? {
                Datum::Value(Value::Number(n)) => {
                    let f = n.as_f64()?;
                    serde_json::Number::from_f64(-f).map(|n| Datum::Value(Value::Number(n)))
                }
                Datum::Missing => Some(Datum::Missing),
                _ => Some(Datum::Value(Value::Null)),
            },
            Expr::Eq(a, b) => fold_comparison(a, b, |o| o.is_eq()),
            Expr::Lt(a, b) => fold_comparison(a, b, |o| o.is_lt()),
            Expr::Le(a, b) => fold_comparison(a, b, |o| o.is_le()),
            Expr::IsMissing(e) => Some(bool_datum(matches!(e.static_value()?, Datum::Missing))),
            Expr::IsNotMissing(e) => {
                Some(bool_datum(!matches!(e.static_value()?, Datum::Missing)))
            }
            Expr::IsNull(e) => match e.static_value()? {
                Datum::Missing => Some(Datum::Missing),
                Datum::Value(v) => Some(bool_datum(v.is_null())),
            },
            Expr::IsNotNull(e) => match e.static_value()? {
                Datum::Missing => Some(Datum::Missing),
                Datum::Value(v) => Some(bool_datum(!v.is_null())),
            },
            Expr::IsValued(e) => Some(bool_datum(matches!(
                e.static_value()?,
                Datum::Value(ref v) if !v.is_null()
            ))),
            Expr::IsNotValued(e) => Some(bool_datum(!matches!(
                e.static_value()?,
                Datum::Value(ref v) if !v.is_null()
            ))),
            Expr::Not(e) => match e.static_value()? {
                Datum::Missing => Some(Datum::Missing),
                Datum::Value(Value::Null) => Some(Datum::Value(Value::Null)),
                Datum::Value(v) => Some(bool_datum(!truthy(&v))),
            },
            Expr::And(ops) => {
                // FALSE anywhere decides the conjunction even if other
                // operands are not literals.
                let mut all_true = true;
                for op in ops {
                    match op.static_value() {
                        Some(Datum::Value(ref v)) if !v.is_null() && !truthy(v) => {
                            return Some(bool_datum(false))
                        }
                        Some(Datum::Value(ref v)) if truthy(v) => {}
                        _ => all_true = false,
                    }
                }
                all_true.then(|| bool_datum(true))
            }
            Expr::Or(ops) => {
                let mut all_false = true;
                for op in ops {
                    match op.static_value() {
                        Some(Datum::Value(ref v)) if truthy(v) => return Some(bool_datum(true)),
                        Some(Datum::Value(ref v)) if !v.is_null() => {}
                        _ => all_false = false,
                    }
                }
                all_false.then(|| bool_datum(false))
            }
            _ => None,
        }
    }

    /// Statically known truth value in a filtering context.
    pub fn static_truth(&self) -> Option<bool> {
        match self.static_value()? {
            Datum::Missing => Some(false),
            Datum::Value(v) => Some(truthy(&v)),
        }
    }

    /// A comparison with a literal MISSING or NULL operand. It can never be
    /// TRUE, whatever the other operands hold.
    pub fn always_unknown(&self) -> bool {
        let operands: Vec<&Expr> = match self {
            Expr::Eq(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b)
            | Expr::Like(a, b)
            | Expr::RegexpLike(a, b)
            | Expr::In(a, b)
            | Expr::Within(a, b) => vec![&**a, &**b],
            Expr::Between(a, b, c) => vec![&**a, &**b, &**c],
            _ => return false,
        };
        operands.into_iter().any(|op| {
            matches!(op, Expr::Missing) || matches!(op, Expr::Constant(Value::Null))
        })
    }

    /// Short operator name used by logs and explain output.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "constant",
            Expr::Missing => "missing",
            Expr::Identifier(_) => "identifier",
            Expr::Field(..) => "field",
            Expr::Element(..) => "element",
            Expr::MetaId(_) => "meta_id",
            Expr::Parameter(_) => "parameter",
            Expr::Add(_) => "add",
            Expr::Sub(..) => "sub",
            Expr::Mult(_) => "mult",
            Expr::Div(..) => "div",
            Expr::Mod(..) => "mod",
            Expr::Neg(_) => "neg",
            Expr::Concat(_) => "concat",
            Expr::ArrayConstruct(_) => "array",
            Expr::ObjectConstruct(_) => "object",
            Expr::Function(..) => "function",
            Expr::RegexpLike(..) => "regexp_like",
            Expr::Case { .. } => "case",
            Expr::Eq(..) => "eq",
            Expr::Lt(..) => "lt",
            Expr::Le(..) => "le",
            Expr::Between(..) => "between",
            Expr::Like(..) => "like",
            Expr::In(..) => "in",
            Expr::Within(..) => "within",
            Expr::IsMissing(_) => "is_missing",
            Expr::IsNotMissing(_) => "is_not_missing",
            Expr::IsNull(_) => "is_null",
            Expr::IsNotNull(_) => "is_not_null",
            Expr::IsValued(_) => "is_valued",
            Expr::IsNotValued(_) => "is_not_valued",
            Expr::And(_) => "and",
            Expr::Or(_) => "or",
            Expr::Not(_) => "not",
            Expr::Any(_) => "any",
            Expr::Every(_) => "every",
            Expr::AnyEvery(_) => "any_every",
            Expr::Exists(_) => "exists",
            Expr::Subquery { .. } => "subquery",
        }
    }

    /// Rewrites every free identifier naming a document field as a path
    /// below `alias`, and the `meta` placeholder as `META(alias).id`.
    ///
    /// Catalog index keys are written relative to the document; this turns
    /// `x` into `alias.x` so keys compare structurally with predicates.
    pub fn formalize(&self, alias: &str) -> Expr {
        self.formalize_with(alias, &mut Vec::new())
    }

    /// [`Expr::formalize`] leaving the names in `bound` untouched.
    pub fn formalize_except(&self, alias: &str, bound: &[String]) -> Expr {
        self.formalize_with(alias, &mut bound.to_vec())
    }

    fn formalize_with(&self, alias: &str, bound: &mut Vec<String>) -> Expr {
        match self {
            Expr::Identifier(name) if bound.iter().any(|b| b == name) => self.clone(),
            Expr::Identifier(name) if name == META_PLACEHOLDER => Expr::MetaId(alias.to_string()),
            Expr::Identifier(name) => Expr::Field(
                Box::new(Expr::Identifier(alias.to_string())),
                name.clone(),
            ),
            Expr::Any(q) => Expr::Any(formalize_quantifier(q, alias, bound)),
            Expr::Every(q) => Expr::Every(formalize_quantifier(q, alias, bound)),
            Expr::AnyEvery(q) => Expr::AnyEvery(formalize_quantifier(q, alias, bound)),
            _ => self.map_children(&mut |child| child.formalize_with(alias, bound)),
        }
    }

    /// Rebuilds the node with `f` applied to each direct child.
    pub fn map_children<F: FnMut(&Expr) -> Expr>(&self, f: &mut F) -> Expr {
        match self {
            Expr::Constant(_)
            | Expr::Missing
            | Expr::Identifier(_)
            | Expr::MetaId(_)
            | Expr::Parameter(_)
            | Expr::Subquery { .. } => self.clone(),
            Expr::Field(base, name) => Expr::Field(Box::new(f(base)), name.clone()),
            Expr::Element(a, b) => Expr::Element(Box::new(f(a)), Box::new(f(b))),
            Expr::Add(ops) => Expr::Add(ops.iter().map(|e| f(e)).collect()),
            Expr::Sub(a, b) => Expr::Sub(Box::new(f(a)), Box::new(f(b))),
            Expr::Mult(ops) => Expr::Mult(ops.iter().map(|e| f(e)).collect()),
            Expr::Div(a, b) => Expr::Div(Box::new(f(a)), Box::new(f(b))),
            Expr::Mod(a, b) => Expr::Mod(Box::new(f(a)), Box::new(f(b))),
            Expr::Neg(e) => Expr::Neg(Box::new(f(e))),
            Expr::Concat(ops) => Expr::Concat(ops.iter().map(|e| f(e)).collect()),
            Expr::ArrayConstruct(ops) => Expr::ArrayConstruct(ops.iter().map(|e| f(e)).collect()),
            Expr::ObjectConstruct(pairs) => Expr::ObjectConstruct(
                pairs.iter().map(|(k, e)| (k.clone(), f(e))).collect(),
            ),
            Expr::Function(name, ops) => {
                Expr::Function(name.clone(), ops.iter().map(|e| f(e)).collect())
            }
            Expr::RegexpLike(a, b) => Expr::RegexpLike(Box::new(f(a)), Box::new(f(b))),
            Expr::Case { whens, otherwise } => Expr::Case {
                whens: whens.iter().map(|(c, r)| (f(c), f(r))).collect(),
                otherwise: otherwise.as_ref().map(|e| Box::new(f(e))),
            },
            Expr::Eq(a, b) => Expr::Eq(Box::new(f(a)), Box::new(f(b))),
            Expr::Lt(a, b) => Expr::Lt(Box::new(f(a)), Box::new(f(b))),
            Expr::Le(a, b) => Expr::Le(Box::new(f(a)), Box::new(f(b))),
            Expr::Between(a, b, c) => Expr::Between(Box::new(f(a)), Box::new(f(b)), Box::new(f(c))),
            Expr::Like(a, b) => Expr::Like(Box::new(f(a)), Box::new(f(b))),
            Expr::In(a, b) => Expr::In(Box::new(f(a)), Box::new(f(b))),
            Expr::Within(a, b) => Expr::Within(Box::new(f(a)), Box::new(f(b))),
            Expr::IsMissing(e) => Expr::IsMissing(Box::new(f(e))),
            Expr::IsNotMissing(e) => Expr::IsNotMissing(Box::new(f(e))),
            Expr::IsNull(e) => Expr::IsNull(Box::new(f(e))),
            Expr::IsNotNull(e) => Expr::IsNotNull(Box::new(f(e))),
            Expr::IsValued(e) => Expr::IsValued(Box::new(f(e))),
            Expr::IsNotValued(e) => Expr::IsNotValued(Box::new(f(e))),
            Expr::And(ops) => Expr::And(ops.iter().map(|e| f(e)).collect()),
            Expr::Or(ops) => Expr::Or(ops.iter().map(|e| f(e)).collect()),
            Expr::Not(e) => Expr::Not(Box::new(f(e))),
            Expr::Any(q) => Expr::Any(map_quantifier(q, f)),
            Expr::Every(q) => Expr::Every(map_quantifier(q, f)),
            Expr::AnyEvery(q) => Expr::AnyEvery(map_quantifier(q, f)),
            Expr::Exists(e) => Expr::Exists(Box::new(f(e))),
        }
    }

    /// Replaces every occurrence of `from` with `to`.
    pub fn replace(&self, from: &Expr, to: &Expr) -> Expr {
        if self == from {
            return to.clone();
        }
        self.map_children(&mut |child| child.replace(from, to))
    }
}

/// Identifier that stands for the document key inside catalog index keys.
pub const META_PLACEHOLDER: &str = "meta().id";

/// AND of the given expressions, `None` when empty.
pub fn and_all(mut exprs: Vec<Expr>) -> Option<Expr> {
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(Expr::And(exprs)),
    }
}

/// OR of the given expressions, `None` when empty.
pub fn or_all(mut exprs: Vec<Expr>) -> Option<Expr> {
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(Expr::Or(exprs)),
    }
}

fn bool_datum(b: bool) -> Datum {
    Datum::Value(Value::Bool(b))
}

fn fold_comparison(
    a: &Expr,
    b: &Expr,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Option<Datum> {
    match (a.static_value()?, b.static_value()?) {
        (Datum::Missing, _) | (_, Datum::Missing) => Some(Datum::Missing),
        (Datum::Value(Value::Null), _) | (_, Datum::Value(Value::Null)) => {
            Some(Datum::Value(Value::Null))
        }
        (Datum::Value(x), Datum::Value(y)) => Some(bool_datum(accept(collate(&x, &y)))),
    }
}

fn formalize_quantifier(q: &Quantifier, alias: &str, bound: &mut Vec<String>) -> Quantifier {
    let depth = bound.len();
    let mut bindings = Vec::with_capacity(q.bindings.len());
    for b in &q.bindings {
        bindings.push(Binding {
            variable: b.variable.clone(),
            expr: b.expr.formalize_with(alias, bound),
        });
        bound.push(b.variable.clone());
    }
    let satisfies = Box::new(q.satisfies.formalize_with(alias, bound));
    bound.truncate(depth);
    Quantifier { bindings, satisfies }
}

fn map_quantifier<F: FnMut(&Expr) -> Expr>(q: &Quantifier, f: &mut F) -> Quantifier {
    Quantifier {
        bindings: q
            .bindings
            .iter()
            .map(|b| Binding {
                variable: b.variable.clone(),
                expr: f(&b.expr),
            })
            .collect(),
        satisfies: Box::new(f(&q.satisfies)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_identifiers_skip_bound_variables() {
        let e = any(
            vec![binding("v", path("a", "tags"))],
            eq(ident("v"), path("b", "tag")),
        );
        let free = e.free_identifiers();
        assert!(free.contains("a"));
        assert!(free.contains("b"));
        assert!(!free.contains("v"));
    }

    #[test]
    fn test_meta_id_counts_as_reference() {
        let e = eq(meta_id("b"), path("a", "bid"));
        let known = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let refs = e.referenced_aliases(&known);
        assert_eq!(refs.len(), 2);
        assert!(!refs.contains("c"));
    }

    #[test]
    fn test_static_folding() {
        assert_eq!(eq(constant(json!(1)), constant(json!(1))).static_truth(), Some(true));
        assert_eq!(lt(constant(json!(2)), constant(json!(1))).static_truth(), Some(false));
        assert_eq!(eq(path("a", "x"), constant(json!(1))).static_truth(), None);
        assert_eq!(Expr::Missing.static_truth(), Some(false));
    }

    #[test]
    fn test_and_false_decides_without_literal_siblings() {
        let e = and(vec![path("a", "x"), constant(json!(false))]);
        assert_eq!(e.static_truth(), Some(false));
    }

    #[test]
    fn test_always_unknown() {
        assert!(eq(path("a", "x"), Expr::Missing).always_unknown());
        assert!(lt(constant(json!(null)), path("a", "x")).always_unknown());
        assert!(!eq(path("a", "x"), constant(json!(1))).always_unknown());
    }

    #[test]
    fn test_formalize_index_key() {
        let key = field(ident("x"), "y");
        assert_eq!(key.formalize("a"), path("a", "x.y"));
        assert_eq!(ident(META_PLACEHOLDER).formalize("a"), meta_id("a"));
    }

    #[test]
    fn test_parameters_are_static() {
        assert!(param("p").is_static());
        assert!(!path("a", "x").is_static());
        let sub = Expr::Subquery {
            text: "SELECT 1".into(),
            correlated_on: vec![],
        };
        assert!(!sub.is_static());
    }

    #[test]
    fn test_conjuncts_flatten_nested_and() {
        let e = and(vec![
            and(vec![path("a", "x"), path("a", "y")]),
            path("a", "z"),
        ]);
        assert_eq!(e.conjuncts().len(), 3);
    }

    #[test]
    fn test_expr_json_round_trip_shape() {
        let e = eq(path("a", "x"), constant(json!(1)));
        let text = serde_json::to_string(&e).unwrap();
        assert!(text.starts_with("{\"eq\""));
        let back: Expr = serde_json::from_str(&text).unwrap();
        assert_eq!(back, e);
    }
}
