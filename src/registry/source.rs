//! Per-alias planning record (one FROM-clause term)

use std::collections::BTreeSet;

use serde::Serialize;

use crate::expr::{and_all, Expr};

use super::filter::{Filter, FilterFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Keyspace,
    Expression,
    Subquery,
    Unnest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSource {
    pub alias: String,
    /// Catalog path; absent for expression, subquery and unnest terms
    pub keyspace: Option<String>,
    pub kind: SourceKind,
    pub filters: Vec<Filter>,
    pub join_filters: Vec<Filter>,
    /// AND of `filters`, set by [`DataSource::combine_filters`]
    pub dnf_pred: Option<Expr>,
    /// AND of the original text of `filters`
    pub orig_pred: Option<Expr>,
    /// AND of the ON-clause filters
    pub onclause: Option<Expr>,
    /// Number of outer joins this alias is on the subservient side of
    pub outer_level: u32,
    /// First term of the FROM clause
    pub primary: bool,
    pub plan_done: bool,
    /// For unnest sources, the alias whose document is unnested
    pub unnest_of: Option<String>,
    /// Unnest aliases that depend on this source
    pub unnests: BTreeSet<String>,
    #[serde(skip)]
    pub(crate) doc_count: Option<Option<u64>>,
}

impl DataSource {
    pub fn new(alias: &str, keyspace: Option<&str>, kind: SourceKind) -> Self {
        Self {
            alias: alias.to_string(),
            keyspace: keyspace.map(str::to_string),
            kind,
            filters: Vec::new(),
            join_filters: Vec::new(),
            dnf_pred: None,
            orig_pred: None,
            onclause: None,
            outer_level: 0,
            primary: false,
            plan_done: false,
            unnest_of: None,
            unnests: BTreeSet::new(),
            doc_count: None,
        }
    }

    pub fn keyspace(alias: &str, keyspace: &str) -> Self {
        Self::new(alias, Some(keyspace), SourceKind::Keyspace)
    }

    /// Document count fetched by [`FilterRegistry::document_count`], if it
    /// was fetched and known.
    ///
    /// [`FilterRegistry::document_count`]: super::FilterRegistry::document_count
    pub fn cached_document_count(&self) -> Option<u64> {
        self.doc_count.flatten()
    }

    pub fn is_outer(&self) -> bool {
        self.outer_level > 0
    }

    /// A WHERE fragment on an outer-side alias can only run after the join.
    pub fn is_postjoin_filter(&self, filter: &Filter) -> bool {
        self.is_outer() && !filter.is_onclause()
    }

    /// Same record with no filters and no combined predicates.
    pub fn without_filters(&self) -> Self {
        Self {
            filters: Vec::new(),
            join_filters: Vec::new(),
            dnf_pred: None,
            orig_pred: None,
            onclause: None,
            ..self.clone()
        }
    }

    /// Rebuilds `dnf_pred`, `orig_pred` and `onclause` from `filters`.
    pub fn combine_filters(&mut self) {
        self.dnf_pred = and_all(self.filters.iter().map(|f| f.expr().clone()).collect());
        self.orig_pred = and_all(self.filters.iter().map(|f| f.orig_expr().clone()).collect());
        self.onclause = and_all(
            self.filters
                .iter()
                .filter(|f| f.is_onclause())
                .map(|f| f.expr().clone())
                .collect(),
        );
    }

    /// Sets `flag` on every filter whose expression is one of `exprs`.
    pub fn flag_filters(&mut self, exprs: &[Expr], flag: FilterFlags) {
        for f in self.filters.iter_mut().filter(|f| exprs.contains(f.expr())) {
            f.set_flag(flag);
        }
    }

    pub fn clear_transient_flags(&mut self) {
        for f in self.filters.iter_mut().chain(self.join_filters.iter_mut()) {
            f.clear_transient();
        }
    }
}
