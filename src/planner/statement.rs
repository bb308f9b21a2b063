//! Statement model handed to the planner
//!
//! Parsing is done elsewhere; statements arrive as these structures,
//! usually deserialized from JSON.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

use super::hints::Hints;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Projected expressions; empty selects whole documents
    #[serde(default)]
    pub projection: Vec<Expr>,
    #[serde(default)]
    pub from: Option<FromTerm>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Expr>,
    #[serde(default)]
    pub order_by: Vec<OrderTerm>,
    #[serde(default)]
    pub group_by: Vec<Expr>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl Statement {
    pub fn new(from: FromTerm) -> Self {
        Self {
            projection: Vec::new(),
            from: Some(from),
            where_clause: None,
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_where(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn with_projection(mut self, projection: Vec<Expr>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_order_by(mut self, expr: Expr, desc: bool) -> Self {
        self.order_by.push(OrderTerm { expr, desc });
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Only a bare LIMIT lets a join favour the cheapest first row.
    pub fn limit_only(&self) -> Option<u64> {
        if self.order_by.is_empty() && self.group_by.is_empty() {
            self.limit
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expr: Expr,
    #[serde(default)]
    pub desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceTerm {
    pub alias: String,
    pub keyspace: String,
    #[serde(default)]
    pub hints: Hints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionTerm {
    pub alias: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryTerm {
    pub alias: String,
    /// Subquery text, kept for display only
    pub text: String,
    #[serde(default)]
    pub correlated: bool,
}

/// A term that can appear on the right of a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleTerm {
    Keyspace(KeyspaceTerm),
    Expression(ExpressionTerm),
    Subquery(SubqueryTerm),
}

impl SimpleTerm {
    pub fn alias(&self) -> &str {
        match self {
            SimpleTerm::Keyspace(t) => &t.alias,
            SimpleTerm::Expression(t) => &t.alias,
            SimpleTerm::Subquery(t) => &t.alias,
        }
    }

    pub fn hints(&self) -> Option<&Hints> {
        match self {
            SimpleTerm::Keyspace(t) => Some(&t.hints),
            _ => None,
        }
    }

    /// True when the term's rows depend on another alias of the statement.
    pub fn is_correlated(&self, known: &[String]) -> bool {
        match self {
            SimpleTerm::Keyspace(_) => false,
            SimpleTerm::Expression(t) => t
                .expr
                .free_identifiers()
                .iter()
                .any(|id| id != &t.alias && known.contains(id)),
            SimpleTerm::Subquery(t) => t.correlated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinTerm {
    pub left: FromTerm,
    pub right: SimpleTerm,
    #[serde(default)]
    pub onclause: Option<Expr>,
    #[serde(default)]
    pub outer: bool,
    /// NEST instead of JOIN
    #[serde(default)]
    pub nest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnnestTerm {
    pub left: FromTerm,
    pub alias: String,
    pub expr: Expr,
    #[serde(default)]
    pub outer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FromTerm {
    Keyspace(KeyspaceTerm),
    Expression(ExpressionTerm),
    Subquery(SubqueryTerm),
    Join(Box<JoinTerm>),
    Unnest(Box<UnnestTerm>),
}

impl FromTerm {
    pub fn keyspace(alias: &str, keyspace: &str) -> Self {
        FromTerm::Keyspace(KeyspaceTerm {
            alias: alias.to_string(),
            keyspace: keyspace.to_string(),
            hints: Hints::default(),
        })
    }

    pub fn keyspace_with_hints(alias: &str, keyspace: &str, hints: Hints) -> Self {
        FromTerm::Keyspace(KeyspaceTerm {
            alias: alias.to_string(),
            keyspace: keyspace.to_string(),
            hints,
        })
    }

    pub fn join(self, right: SimpleTerm, onclause: Option<Expr>, outer: bool) -> Self {
        FromTerm::Join(Box::new(JoinTerm {
            left: self,
            right,
            onclause,
            outer,
            nest: false,
        }))
    }

    pub fn nest(self, right: SimpleTerm, onclause: Option<Expr>, outer: bool) -> Self {
        FromTerm::Join(Box::new(JoinTerm {
            left: self,
            right,
            onclause,
            outer,
            nest: true,
        }))
    }

    pub fn unnest(self, alias: &str, expr: Expr, outer: bool) -> Self {
        FromTerm::Unnest(Box::new(UnnestTerm {
            left: self,
            alias: alias.to_string(),
            expr,
            outer,
        }))
    }

    /// Aliases introduced by this term, left to right.
    pub fn aliases(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_aliases(&mut out);
        out
    }

    /// ON clauses and UNNEST expressions, left to right.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            FromTerm::Keyspace(_) | FromTerm::Subquery(_) => Vec::new(),
            FromTerm::Expression(t) => vec![&t.expr],
            FromTerm::Join(j) => {
                let mut out = j.left.expressions();
                if let SimpleTerm::Expression(t) = &j.right {
                    out.push(&t.expr);
                }
                out.extend(j.onclause.as_ref());
                out
            }
            FromTerm::Unnest(u) => {
                let mut out = u.left.expressions();
                out.push(&u.expr);
                out
            }
        }
    }

    fn collect_aliases(&self, out: &mut Vec<String>) {
        match self {
            FromTerm::Keyspace(t) => out.push(t.alias.clone()),
            FromTerm::Expression(t) => out.push(t.alias.clone()),
            FromTerm::Subquery(t) => out.push(t.alias.clone()),
            FromTerm::Join(j) => {
                j.left.collect_aliases(out);
                out.push(j.right.alias().to_string());
            }
            FromTerm::Unnest(u) => {
                u.left.collect_aliases(out);
                out.push(u.alias.clone());
            }
        }
    }
}

impl SimpleTerm {
    pub fn keyspace(alias: &str, keyspace: &str) -> Self {
        SimpleTerm::Keyspace(KeyspaceTerm {
            alias: alias.to_string(),
            keyspace: keyspace.to_string(),
            hints: Hints::default(),
        })
    }

    pub fn keyspace_with_hints(alias: &str, keyspace: &str, hints: Hints) -> Self {
        SimpleTerm::Keyspace(KeyspaceTerm {
            alias: alias.to_string(),
            keyspace: keyspace.to_string(),
            hints,
        })
    }
}
