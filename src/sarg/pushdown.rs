//! Covering and ORDER BY / LIMIT / OFFSET pushdown for an index scan
//!
//! An index covers a statement when every expression the statement reads
//! from the alias can be evaluated from index entries alone. Order, limit
//! and offset are handed to the index only when the scan's output is
//! exactly the statement's output for that alias.

use serde::Serialize;

use crate::expr::Expr;
use crate::planner::{FromTerm, OrderTerm, Statement};

use super::index::IndexEntry;

/// What the statement needs from the scan of one alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRequirements {
    /// Expressions read from the alias; `None` when whole documents are
    /// returned.
    pub referenced: Option<Vec<Expr>>,
    /// ORDER BY the scan could satisfy
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ScanRequirements {
    /// Requirements of `stmt` on `alias`.
    ///
    /// Order, limit and offset only reach the scan of a statement over one
    /// keyspace term with no GROUP BY.
    pub fn for_alias(stmt: &Statement, alias: &str) -> Self {
        let referenced = if stmt.projection.is_empty() {
            None
        } else {
            let mut exprs: Vec<&Expr> = stmt.projection.iter().collect();
            exprs.extend(stmt.where_clause.iter());
            exprs.extend(stmt.order_by.iter().map(|t| &t.expr));
            exprs.extend(stmt.group_by.iter());
            if let Some(from) = &stmt.from {
                exprs.extend(from.expressions());
            }
            Some(
                exprs
                    .into_iter()
                    .filter(|e| e.references(alias))
                    .cloned()
                    .collect(),
            )
        };

        let alone = stmt.group_by.is_empty()
            && matches!(&stmt.from, Some(FromTerm::Keyspace(t)) if t.alias == alias);
        if !alone {
            return Self {
                referenced,
                ..Self::default()
            };
        }
        Self {
            referenced,
            order_by: stmt.order_by.clone(),
            limit: stmt.limit,
            offset: stmt.offset,
        }
    }
}

/// Work an index scan takes over from later operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pushdowns {
    /// No document fetch after the scan
    pub covering: bool,
    /// Output already in ORDER BY order
    pub index_order: bool,
    /// Rows the scan may stop after
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Pushdowns {
    pub fn for_entry(entry: &IndexEntry, alias: &str, req: &ScanRequirements) -> Self {
        let has_array_key = entry.keys.iter().any(|k| k.is_array());
        let key_exprs: Vec<Expr> = entry.keys.iter().map(|k| k.expr.clone()).collect();
        let covering = !has_array_key
            && req
                .referenced
                .as_ref()
                .map_or(false, |exprs| exprs.iter().all(|e| covers(e, alias, &key_exprs)));

        let index_order = !req.order_by.is_empty() && uses_index_order(entry, &req.order_by);
        let rows_final = entry.exact
            && (req.order_by.is_empty() || index_order)
            && !entry.spans.can_have_duplicates(entry.array);

        let offset = req
            .offset
            .filter(|_| rows_final && entry.spans.can_push_down_offset(entry.array));
        // an offset applied later needs its rows from the scan too
        let limit = req.limit.filter(|_| rows_final).map(|limit| match (req.offset, offset) {
            (Some(skip), None) => limit.saturating_add(skip),
            _ => limit,
        });

        Self {
            covering,
            index_order,
            limit,
            offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `expr` can be evaluated from `keys` and the document key of `alias`.
pub fn covers(expr: &Expr, alias: &str, keys: &[Expr]) -> bool {
    if !expr.references(alias) || keys.contains(expr) {
        return true;
    }
    match expr {
        Expr::MetaId(_) => true,
        Expr::Identifier(_) | Expr::Subquery { .. } => false,
        _ => expr.children().into_iter().all(|c| covers(c, alias, keys)),
    }
}

/// ORDER BY terms follow the index keys. Constant terms are ignored and a
/// key pinned to one value by the spans may be skipped.
fn uses_index_order(entry: &IndexEntry, order_by: &[OrderTerm]) -> bool {
    if entry.array || !entry.spans.can_use_index_order() {
        return false;
    }
    let mut pos = 0;
    for term in order_by.iter().filter(|t| !t.expr.is_static()) {
        loop {
            let key = match entry.keys.get(pos) {
                Some(key) => key,
                None => return false,
            };
            pos += 1;
            if key.expr == term.expr && key.desc == term.desc {
                break;
            }
            if !entry.spans.equivalent_at(pos - 1) {
                return false;
            }
        }
    }
    true
}
