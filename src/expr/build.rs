//! Constructors for expression trees.
//!
//! Used by tests, by the normalizer and by callers assembling statements
//! by hand rather than deserializing them.

use serde_json::Value;

use super::{Binding, Expr, Quantifier};

pub fn constant(v: Value) -> Expr {
    Expr::Constant(v)
}

pub fn ident(name: &str) -> Expr {
    Expr::Identifier(name.to_string())
}

pub fn field(base: Expr, name: &str) -> Expr {
    Expr::Field(Box::new(base), name.to_string())
}

/// `alias.a.b.c` from the dotted path `"a.b.c"`.
pub fn path(alias: &str, dotted: &str) -> Expr {
    dotted
        .split('.')
        .filter(|segment| !segment.is_empty())
        .fold(ident(alias), field)
}

pub fn meta_id(alias: &str) -> Expr {
    Expr::MetaId(alias.to_string())
}

pub fn param(name: &str) -> Expr {
    Expr::Parameter(name.to_string())
}

pub fn eq(a: Expr, b: Expr) -> Expr {
    Expr::Eq(Box::new(a), Box::new(b))
}

pub fn ne(a: Expr, b: Expr) -> Expr {
    not(eq(a, b))
}

pub fn lt(a: Expr, b: Expr) -> Expr {
    Expr::Lt(Box::new(a), Box::new(b))
}

pub fn le(a: Expr, b: Expr) -> Expr {
    Expr::Le(Box::new(a), Box::new(b))
}

/// `a > b`, stored as `b < a`.
pub fn gt(a: Expr, b: Expr) -> Expr {
    lt(b, a)
}

/// `a >= b`, stored as `b <= a`.
pub fn ge(a: Expr, b: Expr) -> Expr {
    le(b, a)
}

pub fn between(e: Expr, low: Expr, high: Expr) -> Expr {
    Expr::Between(Box::new(e), Box::new(low), Box::new(high))
}

pub fn like(e: Expr, pattern: &str) -> Expr {
    Expr::Like(Box::new(e), Box::new(Expr::Constant(Value::String(pattern.into()))))
}

pub fn regexp_like(e: Expr, pattern: &str) -> Expr {
    Expr::RegexpLike(Box::new(e), Box::new(Expr::Constant(Value::String(pattern.into()))))
}

pub fn in_list(e: Expr, list: Expr) -> Expr {
    Expr::In(Box::new(e), Box::new(list))
}

pub fn within(e: Expr, collection: Expr) -> Expr {
    Expr::Within(Box::new(e), Box::new(collection))
}

pub fn and(ops: Vec<Expr>) -> Expr {
    Expr::And(ops)
}

pub fn or(ops: Vec<Expr>) -> Expr {
    Expr::Or(ops)
}

pub fn not(e: Expr) -> Expr {
    Expr::Not(Box::new(e))
}

pub fn is_missing(e: Expr) -> Expr {
    Expr::IsMissing(Box::new(e))
}

pub fn is_not_missing(e: Expr) -> Expr {
    Expr::IsNotMissing(Box::new(e))
}

pub fn is_null(e: Expr) -> Expr {
    Expr::IsNull(Box::new(e))
}

pub fn is_not_null(e: Expr) -> Expr {
    Expr::IsNotNull(Box::new(e))
}

pub fn is_valued(e: Expr) -> Expr {
    Expr::IsValued(Box::new(e))
}

pub fn is_not_valued(e: Expr) -> Expr {
    Expr::IsNotValued(Box::new(e))
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(name.to_string(), args)
}

pub fn binding(variable: &str, expr: Expr) -> Binding {
    Binding {
        variable: variable.to_string(),
        expr,
    }
}

pub fn any(bindings: Vec<Binding>, satisfies: Expr) -> Expr {
    Expr::Any(Quantifier {
        bindings,
        satisfies: Box::new(satisfies),
    })
}

pub fn every(bindings: Vec<Binding>, satisfies: Expr) -> Expr {
    Expr::Every(Quantifier {
        bindings,
        satisfies: Box::new(satisfies),
    })
}
