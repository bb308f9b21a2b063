//! Index candidates for one data source

use serde::Serialize;

use crate::catalog::{Cost, IndexDef, IndexKey};
use crate::classify::Normalizer;
use crate::expr::Expr;
use crate::observability::{log_event, PlanEvent};

use super::compose::sarg_for;
use super::spans::SargSpans;

/// A sargable index together with the spans it would scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub index: IndexDef,
    #[serde(skip)]
    pub keys: Vec<IndexKey>,
    /// Formalized expressions of the keys that constrain the scan
    pub sarg_keys: Vec<Expr>,
    pub spans: SargSpans,
    /// Scan output needs no further filtering
    pub exact: bool,
    /// A constraining key is an array key
    pub array: bool,
    pub cost: Option<Cost>,
}

impl IndexEntry {
    pub fn name(&self) -> &str {
        &self.index.name
    }

    /// Every sarg key of `self` is a sarg key of `other`, and `other`
    /// has more.
    fn strict_subset_of(&self, other: &IndexEntry) -> bool {
        self.sarg_keys.len() < other.sarg_keys.len()
            && self.sarg_keys.iter().all(|k| other.sarg_keys.contains(k))
    }

    fn same_keys(&self, other: &IndexEntry) -> bool {
        self.sarg_keys.len() == other.sarg_keys.len()
            && self.sarg_keys.iter().all(|k| other.sarg_keys.contains(k))
    }
}

/// Online secondary indexes of `alias` usable for `pred`, in name order.
///
/// An index qualifies when its partial-index condition is implied by the
/// predicate (each condition conjunct appears among the predicate
/// conjuncts) and its leading key is sargable.
pub fn candidate_indexes(alias: &str, indexes: &[IndexDef], pred: &Expr, fanout_limit: usize) -> Vec<IndexEntry> {
    let normalizer = Normalizer::local(usize::MAX);
    let conjuncts = pred.conjuncts();
    let mut out = Vec::new();

    for index in indexes {
        if index.primary || !index.is_online() || index.keys.is_empty() {
            continue;
        }
        let condition: Vec<Expr> = match index.formalized_condition(alias) {
            Some(c) => normalizer.normalize(&c).conjuncts().into_iter().cloned().collect(),
            None => Vec::new(),
        };
        if !condition.iter().all(|c| conjuncts.contains(&c)) {
            continue;
        }
        let keys = index.formalized_keys(alias);
        let sarg = match sarg_for(pred, &keys, alias, fanout_limit) {
            Some(s) => s,
            None => continue,
        };
        let exact = sarg.spans.is_exact() && sarg.uncovered.iter().all(|u| condition.contains(u));
        let used = &keys[..sarg.sarg_keys.min(keys.len())];
        out.push(IndexEntry {
            index: index.clone(),
            sarg_keys: used.iter().map(|k| k.expr.clone()).collect(),
            array: used.iter().any(IndexKey::is_array),
            keys,
            spans: sarg.spans,
            exact,
            cost: None,
        });
    }
    out.sort_by(|a, b| a.index.name.cmp(&b.index.name));
    out
}

/// Drops every candidate whose sarg keys are a strict subset of another
/// candidate's. Of candidates with the same key set only the one with the
/// smallest name survives.
pub fn minimal_indexes(alias: &str, mut entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let before = entries.len();
    entries.sort_by(|a, b| a.index.name.cmp(&b.index.name));

    let mut kept: Vec<IndexEntry> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let dominated = entries.iter().enumerate().any(|(j, other)| {
            j != i && (entry.strict_subset_of(other) || (j < i && entry.same_keys(other)))
        });
        if !dominated {
            kept.push(entry.clone());
        }
    }

    if kept.len() < before {
        let pruned = (before - kept.len()).to_string();
        let names: Vec<&str> = kept.iter().map(IndexEntry::name).collect();
        let names = names.join(",");
        log_event(
            PlanEvent::IndexCandidatesPruned,
            &[("alias", alias), ("pruned", pruned.as_str()), ("kept", names.as_str())],
        );
    }
    kept
}
