//! Textual rendering used by explain output and log fields.

use std::fmt;

use super::{Expr, Quantifier};

fn join(f: &mut fmt::Formatter<'_>, ops: &[Expr], sep: &str) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", op)?;
    }
    Ok(())
}

fn quantified(f: &mut fmt::Formatter<'_>, word: &str, q: &Quantifier) -> fmt::Result {
    write!(f, "{} ", word)?;
    for (i, b) in q.bindings.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{} IN {}", b.variable, b.expr)?;
    }
    write!(f, " SATISFIES {} END", q.satisfies)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(v) => write!(f, "{}", v),
            Expr::Missing => write!(f, "MISSING"),
            Expr::Identifier(name) => write!(f, "`{}`", name),
            Expr::Field(base, name) => write!(f, "{}.`{}`", base, name),
            Expr::Element(base, idx) => write!(f, "{}[{}]", base, idx),
            Expr::MetaId(alias) => write!(f, "META(`{}`).id", alias),
            Expr::Parameter(name) => write!(f, "${}", name),
            Expr::Add(ops) => {
                write!(f, "(")?;
                join(f, ops, " + ")?;
                write!(f, ")")
            }
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mult(ops) => {
                write!(f, "(")?;
                join(f, ops, " * ")?;
                write!(f, ")")
            }
            Expr::Div(a, b) => write!(f, "({} / {})", a, b),
            Expr::Mod(a, b) => write!(f, "({} % {})", a, b),
            Expr::Neg(e) => write!(f, "(-{})", e),
            Expr::Concat(ops) => {
                write!(f, "(")?;
                join(f, ops, " || ")?;
                write!(f, ")")
            }
            Expr::ArrayConstruct(ops) => {
                write!(f, "[")?;
                join(f, ops, ", ")?;
                write!(f, "]")
            }
            Expr::ObjectConstruct(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expr::Function(name, args) => {
                write!(f, "{}(", name.to_uppercase())?;
                join(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::RegexpLike(a, b) => write!(f, "REGEXP_LIKE({}, {})", a, b),
            Expr::Case { whens, otherwise } => {
                write!(f, "CASE")?;
                for (cond, result) in whens {
                    write!(f, " WHEN {} THEN {}", cond, result)?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expr::Eq(a, b) => write!(f, "({} = {})", a, b),
            Expr::Lt(a, b) => write!(f, "({} < {})", a, b),
            Expr::Le(a, b) => write!(f, "({} <= {})", a, b),
            Expr::Between(e, lo, hi) => write!(f, "({} BETWEEN {} AND {})", e, lo, hi),
            Expr::Like(a, b) => write!(f, "({} LIKE {})", a, b),
            Expr::In(a, b) => write!(f, "({} IN {})", a, b),
            Expr::Within(a, b) => write!(f, "({} WITHIN {})", a, b),
            Expr::IsMissing(e) => write!(f, "({} IS MISSING)", e),
            Expr::IsNotMissing(e) => write!(f, "({} IS NOT MISSING)", e),
            Expr::IsNull(e) => write!(f, "({} IS NULL)", e),
            Expr::IsNotNull(e) => write!(f, "({} IS NOT NULL)", e),
            Expr::IsValued(e) => write!(f, "({} IS VALUED)", e),
            Expr::IsNotValued(e) => write!(f, "({} IS NOT VALUED)", e),
            Expr::And(ops) => {
                write!(f, "(")?;
                join(f, ops, " AND ")?;
                write!(f, ")")
            }
            Expr::Or(ops) => {
                write!(f, "(")?;
                join(f, ops, " OR ")?;
                write!(f, ")")
            }
            Expr::Not(e) => write!(f, "(NOT {})", e),
            Expr::Any(q) => quantified(f, "ANY", q),
            Expr::Every(q) => quantified(f, "EVERY", q),
            Expr::AnyEvery(q) => quantified(f, "ANY AND EVERY", q),
            Expr::Exists(e) => write!(f, "(EXISTS {})", e),
            Expr::Subquery { text, .. } => write!(f, "({})", text),
        }
    }
}
