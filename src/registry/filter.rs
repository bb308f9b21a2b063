//! Classified predicate fragments

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::expr::Expr;

/// Bit set of [`Filter`] properties.
///
/// The first group is fixed at classification time. The transient group
/// records what one planning attempt used the filter for and is cleared
/// when an attempt is abandoned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterFlags(u32);

impl FilterFlags {
    /// Came from an ON clause rather than WHERE
    pub const ONCLAUSE: FilterFlags = FilterFlags(1 << 0);
    /// References more than one data source
    pub const JOIN: FilterFlags = FilterFlags(1 << 1);
    /// Synthesized from a multi-source disjunction
    pub const DERIVED: FilterFlags = FilterFlags(1 << 2);
    pub const SUBQUERY: FilterFlags = FilterFlags(1 << 3);
    /// Selectivity has been asked for, successfully or not
    pub const SELEC_DONE: FilterFlags = FilterFlags(1 << 4);

    /// Absorbed by an index span
    pub const INDEX_SPAN: FilterFlags = FilterFlags(1 << 8);
    /// Used as a hash-join key pair
    pub const HASH_JOIN: FilterFlags = FilterFlags(1 << 9);
    /// Drives a key-lookup join
    pub const PRIMARY_JOIN: FilterFlags = FilterFlags(1 << 10);

    pub const TRANSIENT: FilterFlags =
        FilterFlags(Self::INDEX_SPAN.0 | Self::HASH_JOIN.0 | Self::PRIMARY_JOIN.0);

    pub const fn empty() -> Self {
        FilterFlags(0)
    }

    pub fn contains(self, other: FilterFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FilterFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FilterFlags) {
        self.0 &= !other.0;
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for FilterFlags {
    type Output = FilterFlags;

    fn bitor(self, rhs: FilterFlags) -> FilterFlags {
        FilterFlags(self.0 | rhs.0)
    }
}

/// One conjunct-level predicate fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    expr: Expr,
    orig_expr: Expr,
    keyspaces: BTreeSet<String>,
    orig_keyspaces: BTreeSet<String>,
    flags: FilterFlags,
    selectivity: Option<f64>,
}

impl Filter {
    /// `expr` is the normalized fragment, `orig_expr` the text the user
    /// wrote. `keyspaces` are the aliases still unplanned when the
    /// fragment was classified; `orig_keyspaces` every alias it mentions.
    pub fn new(
        expr: Expr,
        orig_expr: Expr,
        keyspaces: BTreeSet<String>,
        orig_keyspaces: BTreeSet<String>,
        onclause: bool,
    ) -> Self {
        let mut flags = FilterFlags::empty();
        if onclause {
            flags.insert(FilterFlags::ONCLAUSE);
        }
        if orig_keyspaces.len() > 1 {
            flags.insert(FilterFlags::JOIN);
        }
        if expr.has_subquery() {
            flags.insert(FilterFlags::SUBQUERY);
        }
        Self {
            expr,
            orig_expr,
            keyspaces,
            orig_keyspaces,
            flags,
            selectivity: None,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn orig_expr(&self) -> &Expr {
        &self.orig_expr
    }

    pub fn keyspaces(&self) -> &BTreeSet<String> {
        &self.keyspaces
    }

    pub fn orig_keyspaces(&self) -> &BTreeSet<String> {
        &self.orig_keyspaces
    }

    pub fn flags(&self) -> FilterFlags {
        self.flags
    }

    pub fn is_onclause(&self) -> bool {
        self.flags.contains(FilterFlags::ONCLAUSE)
    }

    pub fn is_join(&self) -> bool {
        self.flags.contains(FilterFlags::JOIN)
    }

    pub fn is_derived(&self) -> bool {
        self.flags.contains(FilterFlags::DERIVED)
    }

    pub fn has_subquery(&self) -> bool {
        self.flags.contains(FilterFlags::SUBQUERY)
    }

    pub fn selectivity(&self) -> Option<f64> {
        self.selectivity
    }

    pub fn set_selectivity(&mut self, selectivity: Option<f64>) {
        self.selectivity = selectivity;
        self.flags.insert(FilterFlags::SELEC_DONE);
    }

    pub fn set_flag(&mut self, flag: FilterFlags) {
        self.flags.insert(flag);
    }

    pub fn clear_transient(&mut self) {
        self.flags.remove(FilterFlags::TRANSIENT);
    }

    pub(crate) fn mark_derived(&mut self) {
        self.flags.insert(FilterFlags::DERIVED);
    }

    /// Narrows the live reference set to `alias` once every other
    /// referenced source is planned.
    pub(crate) fn localize(&mut self, alias: &str) {
        self.keyspaces = std::iter::once(alias.to_string()).collect();
    }

    /// Aliases other than `alias` the fragment originally referenced.
    pub fn other_aliases<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.orig_keyspaces.iter().filter(move |k| k.as_str() != alias)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}
