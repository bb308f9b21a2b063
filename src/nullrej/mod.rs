//! Null-rejection analysis
//!
//! A predicate is null-rejecting for an alias when it can never be TRUE on
//! a row where that alias contributed no document. Such a predicate in the
//! WHERE clause makes an outer join on that alias equivalent to an inner
//! join.
//!
//! Operands propagate MISSING: a comparison whose alias-referencing
//! operands all evaluate to MISSING when the alias is absent yields MISSING,
//! which filters the row. Functions, CASE and constructors can mask a
//! MISSING operand and are never trusted.

mod rewrite;

pub use rewrite::{rewrite_outer_joins, RewrittenJoin};

use std::collections::BTreeSet;

use crate::expr::Expr;

/// Null-rejection test for one alias.
pub fn null_rejecting(expr: &Expr, alias: &str) -> bool {
    NullRejection::new([alias]).check(expr)
}

/// Null-rejection test against a set of aliases treated as one: the
/// right-hand alias of an outer join together with the unnests that
/// depend on it.
#[derive(Debug, Clone)]
pub struct NullRejection {
    names: BTreeSet<String>,
}

impl NullRejection {
    pub fn new<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            names: names.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn check(&self, expr: &Expr) -> bool {
        self.rejects(expr, &BTreeSet::new())
    }

    /// `vars` holds quantifier variables bound to values derived from one
    /// of the target aliases.
    fn rejects(&self, expr: &Expr, vars: &BTreeSet<String>) -> bool {
        match expr {
            Expr::And(ops) => ops
                .iter()
                .any(|op| self.mentions(op, vars) && self.rejects(op, vars)),
            Expr::Or(ops) => {
                !ops.is_empty()
                    && ops
                        .iter()
                        .all(|op| self.mentions(op, vars) && self.rejects(op, vars))
            }
            Expr::Not(inner) => {
                matches!(
                    **inner,
                    Expr::Eq(..)
                        | Expr::In(..)
                        | Expr::Within(..)
                        | Expr::Like(..)
                        | Expr::Between(..)
                        | Expr::And(_)
                        | Expr::Or(_)
                ) && self.rejects(inner, vars)
            }

            Expr::Eq(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b)
            | Expr::Like(a, b)
            | Expr::RegexpLike(a, b)
            | Expr::In(a, b)
            | Expr::Within(a, b) => self.operands_propagate(&[&**a, &**b], vars),
            Expr::Between(a, b, c) => self.operands_propagate(&[&**a, &**b, &**c], vars),

            Expr::IsNotMissing(x) | Expr::IsNotNull(x) | Expr::IsValued(x) => {
                self.propagates(x, vars)
            }
            Expr::IsMissing(_) | Expr::IsNull(_) | Expr::IsNotValued(_) => false,

            Expr::MetaId(alias) => self.names.contains(alias),
            Expr::Identifier(name) => self.names.contains(name) || vars.contains(name),

            Expr::Any(q) | Expr::Every(q) | Expr::AnyEvery(q) => {
                let mut scoped = vars.clone();
                let mut dependent = false;
                for binding in &q.bindings {
                    if self.mentions(&binding.expr, &scoped) {
                        scoped.insert(binding.variable.clone());
                        dependent = true;
                    } else {
                        scoped.remove(&binding.variable);
                    }
                }
                dependent && self.rejects(&q.satisfies, &scoped)
            }

            Expr::Constant(_)
            | Expr::Missing
            | Expr::Field(..)
            | Expr::Element(..)
            | Expr::Parameter(_)
            | Expr::Add(_)
            | Expr::Sub(..)
            | Expr::Mult(_)
            | Expr::Div(..)
            | Expr::Mod(..)
            | Expr::Neg(_)
            | Expr::Concat(_)
            | Expr::ArrayConstruct(_)
            | Expr::ObjectConstruct(_)
            | Expr::Function(..)
            | Expr::Case { .. }
            | Expr::Exists(_)
            | Expr::Subquery { .. } => false,
        }
    }

    /// At least one operand mentions a target and every such operand
    /// evaluates to MISSING when the target is absent.
    fn operands_propagate(&self, operands: &[&Expr], vars: &BTreeSet<String>) -> bool {
        let mut related = operands
            .iter()
            .filter(|op| self.mentions(op, vars))
            .peekable();
        related.peek().is_some() && related.all(|op| self.propagates(op, vars))
    }

    /// Value-level MISSING propagation.
    fn propagates(&self, expr: &Expr, vars: &BTreeSet<String>) -> bool {
        match expr {
            Expr::Identifier(name) => self.names.contains(name) || vars.contains(name),
            Expr::MetaId(alias) => self.names.contains(alias),
            Expr::Field(base, _) => self.propagates(base, vars),
            Expr::Element(base, index) => self.operands_propagate(&[&**base, &**index], vars),
            Expr::Sub(a, b) | Expr::Div(a, b) | Expr::Mod(a, b) => {
                self.operands_propagate(&[&**a, &**b], vars)
            }
            Expr::Neg(x) => self.propagates(x, vars),
            Expr::Add(ops) | Expr::Mult(ops) | Expr::Concat(ops) => {
                let ops: Vec<&Expr> = ops.iter().collect();
                self.operands_propagate(&ops, vars)
            }
            Expr::Eq(a, b) | Expr::Lt(a, b) | Expr::Le(a, b) | Expr::Like(a, b) => {
                self.operands_propagate(&[&**a, &**b], vars)
            }
            _ => false,
        }
    }

    fn mentions(&self, expr: &Expr, vars: &BTreeSet<String>) -> bool {
        expr.free_identifiers()
            .iter()
            .any(|id| self.names.contains(id) || vars.contains(id))
    }
}
