//! Filter registry
//!
//! Holds, per data-source alias, the predicate fragments the classifier
//! attached to it. A fragment referencing one unplanned alias lives in that
//! alias's `filters`; a fragment referencing several lives in the
//! `join_filters` of each of them.
//!
//! The registry is owned by one statement compilation. Join attempts work
//! on their own clone.

mod filter;
mod source;

pub use filter::{Filter, FilterFlags};
pub use source::{DataSource, SourceKind};

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::catalog::Catalog;
use crate::planner::{PlannerError, PlannerResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterRegistry {
    sources: BTreeMap<String, DataSource>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a data source. Aliases must be unique per statement.
    pub fn insert(&mut self, source: DataSource) -> PlannerResult<()> {
        if self.sources.contains_key(&source.alias) {
            return Err(PlannerError::invalid_statement(format!(
                "duplicate alias '{}'",
                source.alias
            )));
        }
        self.sources.insert(source.alias.clone(), source);
        Ok(())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.sources.contains_key(alias)
    }

    pub fn get(&self, alias: &str) -> PlannerResult<&DataSource> {
        self.sources
            .get(alias)
            .ok_or_else(|| PlannerError::missing_alias(alias))
    }

    pub fn get_mut(&mut self, alias: &str) -> PlannerResult<&mut DataSource> {
        self.sources
            .get_mut(alias)
            .ok_or_else(|| PlannerError::missing_alias(alias))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &String> {
        self.sources.keys()
    }

    pub fn sources(&self) -> impl Iterator<Item = &DataSource> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn plan_done_aliases(&self) -> BTreeSet<String> {
        self.sources
            .values()
            .filter(|s| s.plan_done)
            .map(|s| s.alias.clone())
            .collect()
    }

    /// Attaches a single-source fragment.
    pub fn add_filter(&mut self, alias: &str, filter: Filter) -> PlannerResult<()> {
        self.get_mut(alias)?.filters.push(filter);
        Ok(())
    }

    /// Attaches a multi-source fragment to every alias it references.
    pub fn add_join_filter(&mut self, filter: Filter) -> PlannerResult<()> {
        let aliases: Vec<String> = filter.keyspaces().iter().cloned().collect();
        for alias in aliases {
            self.get_mut(&alias)?.join_filters.push(filter.clone());
        }
        Ok(())
    }

    /// Scratch copy carrying every source but none of their filters.
    pub fn copy_without_filters(&self) -> FilterRegistry {
        FilterRegistry {
            sources: self
                .sources
                .iter()
                .map(|(k, v)| (k.clone(), v.without_filters()))
                .collect(),
        }
    }

    pub fn combine_filters(&mut self) {
        for source in self.sources.values_mut() {
            source.combine_filters();
        }
    }

    /// Marks `alias` planned and moves join filters whose other aliases are
    /// all planned into the remaining source's `filters`.
    pub fn mark_plan_done(&mut self, alias: &str) -> PlannerResult<()> {
        self.get_mut(alias)?.plan_done = true;
        let done = self.plan_done_aliases();

        for source in self.sources.values_mut() {
            if source.plan_done {
                continue;
            }
            let mut kept = Vec::with_capacity(source.join_filters.len());
            let mut moved = false;
            for mut jf in source.join_filters.drain(..) {
                let ready = jf
                    .keyspaces()
                    .iter()
                    .all(|k| k == &source.alias || done.contains(k));
                if ready {
                    jf.localize(&source.alias);
                    source.filters.push(jf);
                    moved = true;
                } else {
                    kept.push(jf);
                }
            }
            source.join_filters = kept;
            if moved {
                source.combine_filters();
            }
        }
        Ok(())
    }

    pub fn clear_transient_flags(&mut self) {
        for source in self.sources.values_mut() {
            source.clear_transient_flags();
        }
    }

    /// Document count for `alias`, fetched from the catalog at most once.
    pub fn document_count(&mut self, alias: &str, catalog: &dyn Catalog) -> PlannerResult<Option<u64>> {
        let source = self.get_mut(alias)?;
        if let Some(cached) = source.doc_count {
            return Ok(cached);
        }
        let count = source
            .keyspace
            .as_deref()
            .and_then(|ks| catalog.document_count(ks));
        source.doc_count = Some(count);
        Ok(count)
    }

    /// Total single-source and join fragments, for logging.
    pub fn filter_counts(&self) -> (usize, usize) {
        self.sources.values().fold((0, 0), |(f, j), s| {
            (f + s.filters.len(), j + s.join_filters.len())
        })
    }
}
