//! Access path selection for one keyspace source

use std::fmt;

use serde::Serialize;

use crate::catalog::{Catalog, Cost, CostOracle};
use crate::expr::{and_all, Expr};
use crate::observability::{log_event, PlanEvent};
use crate::planner::{HintViolation, PlannerError, PlannerResult};
use crate::registry::{DataSource, Filter};

use super::index::{candidate_indexes, minimal_indexes, IndexEntry};
use super::pushdown::{Pushdowns, ScanRequirements};
use super::spans::SargSpans;

/// Physical access path for one alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScanPlan {
    PrimaryScan {
        alias: String,
        keyspace: String,
        index: String,
    },
    IndexScan {
        alias: String,
        keyspace: String,
        index: String,
        sarg_keys: Vec<Expr>,
        spans: SargSpans,
        exact: bool,
        pushdowns: Pushdowns,
    },
    IntersectScan {
        alias: String,
        scans: Vec<ScanPlan>,
    },
    UnionScan {
        alias: String,
        scans: Vec<ScanPlan>,
    },
    ExpressionScan {
        alias: String,
        expr: Expr,
        correlated: bool,
    },
    SubqueryScan {
        alias: String,
        text: String,
        correlated: bool,
    },
    /// Produces no rows
    DummyScan,
}

impl ScanPlan {
    pub fn alias(&self) -> Option<&str> {
        match self {
            ScanPlan::PrimaryScan { alias, .. }
            | ScanPlan::IndexScan { alias, .. }
            | ScanPlan::IntersectScan { alias, .. }
            | ScanPlan::UnionScan { alias, .. }
            | ScanPlan::ExpressionScan { alias, .. }
            | ScanPlan::SubqueryScan { alias, .. } => Some(alias),
            ScanPlan::DummyScan => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScanPlan::PrimaryScan { .. } => "PrimaryScan",
            ScanPlan::IndexScan { .. } => "IndexScan",
            ScanPlan::IntersectScan { .. } => "IntersectScan",
            ScanPlan::UnionScan { .. } => "UnionScan",
            ScanPlan::ExpressionScan { .. } => "ExpressionScan",
            ScanPlan::SubqueryScan { .. } => "SubqueryScan",
            ScanPlan::DummyScan => "DummyScan",
        }
    }

    /// Names of the indexes read, in plan order.
    pub fn index_names(&self) -> Vec<&str> {
        match self {
            ScanPlan::PrimaryScan { index, .. } | ScanPlan::IndexScan { index, .. } => vec![index],
            ScanPlan::IntersectScan { scans, .. } | ScanPlan::UnionScan { scans, .. } => {
                scans.iter().flat_map(ScanPlan::index_names).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Sarg keys of every index scan in the plan.
    pub fn sarg_keys(&self) -> Vec<&Expr> {
        match self {
            ScanPlan::IndexScan { sarg_keys, .. } => sarg_keys.iter().collect(),
            ScanPlan::IntersectScan { scans, .. } | ScanPlan::UnionScan { scans, .. } => {
                scans.iter().flat_map(ScanPlan::sarg_keys).collect()
            }
            _ => Vec::new(),
        }
    }

    fn index_scan(alias: &str, keyspace: &str, entry: IndexEntry, req: Option<&ScanRequirements>) -> ScanPlan {
        let pushdowns = req.map_or_else(Pushdowns::default, |r| Pushdowns::for_entry(&entry, alias, r));
        ScanPlan::IndexScan {
            alias: alias.to_string(),
            keyspace: keyspace.to_string(),
            index: entry.index.name,
            sarg_keys: entry.sarg_keys,
            spans: entry.spans,
            exact: entry.exact,
            pushdowns,
        }
    }
}

impl fmt::Display for ScanPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPlan::PrimaryScan { alias, keyspace, index } => {
                write!(f, "PrimaryScan {} ({} AS {})", index, keyspace, alias)
            }
            ScanPlan::IndexScan {
                alias,
                keyspace,
                index,
                spans,
                exact,
                pushdowns,
                ..
            } => {
                write!(f, "IndexScan {} ({} AS {}) spans={}", index, keyspace, alias, spans)?;
                if *exact {
                    write!(f, " exact")?;
                }
                if pushdowns.covering {
                    write!(f, " covering")?;
                }
                if pushdowns.index_order {
                    write!(f, " index_order")?;
                }
                if let Some(offset) = pushdowns.offset {
                    write!(f, " offset={}", offset)?;
                }
                if let Some(limit) = pushdowns.limit {
                    write!(f, " limit={}", limit)?;
                }
                Ok(())
            }
            ScanPlan::IntersectScan { alias, scans } | ScanPlan::UnionScan { alias, scans } => {
                write!(f, "{} {} [{}]", self.kind(), alias, scans.len())
            }
            ScanPlan::ExpressionScan { alias, expr, correlated } => {
                write!(f, "ExpressionScan {} AS {}", expr, alias)?;
                if *correlated {
                    write!(f, " correlated")?;
                }
                Ok(())
            }
            ScanPlan::SubqueryScan { alias, text, correlated } => {
                write!(f, "SubqueryScan ({}) AS {}", text, alias)?;
                if *correlated {
                    write!(f, " correlated")?;
                }
                Ok(())
            }
            ScanPlan::DummyScan => write!(f, "DummyScan"),
        }
    }
}

/// Context the scan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// First term, or the build side of a hash join: only the source's own
    /// single-source predicates drive index selection.
    Standalone,
    /// Inner side of a nested-loop join: join predicates whose other sides
    /// are already planned act as dynamic bounds. A primary scan is not
    /// acceptable.
    NestedLoop,
}

/// Result of [`ScanBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltScan {
    pub plan: ScanPlan,
    pub cost: Option<Cost>,
    pub violations: Vec<HintViolation>,
    /// Filter expressions that bound a key of the chosen index scans
    pub spanned: Vec<Expr>,
}

pub struct ScanBuilder<'a> {
    catalog: &'a dyn Catalog,
    oracle: Option<&'a dyn CostOracle>,
    fanout_limit: usize,
    requirements: Option<ScanRequirements>,
}

impl<'a> ScanBuilder<'a> {
    pub fn new(catalog: &'a dyn Catalog, oracle: Option<&'a dyn CostOracle>, fanout_limit: usize) -> Self {
        Self {
            catalog,
            oracle,
            fanout_limit,
            requirements: None,
        }
    }

    /// Lets a single chosen index scan take over covering, order, limit
    /// and offset where `requirements` allow.
    pub fn with_requirements(mut self, requirements: ScanRequirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    fn eligible_filters(source: &DataSource, mode: ScanMode) -> Vec<&Filter> {
        source
            .filters
            .iter()
            .filter(|f| !source.is_postjoin_filter(f))
            .filter(|f| mode == ScanMode::NestedLoop || !f.is_join())
            .collect()
    }

    /// AND of the filters that may drive index selection for `source`.
    pub fn eligible_predicate(source: &DataSource, mode: ScanMode) -> Option<Expr> {
        let exprs = Self::eligible_filters(source, mode)
            .into_iter()
            .map(|f| f.expr().clone())
            .collect();
        and_all(exprs)
    }

    pub fn build(
        &self,
        source: &DataSource,
        mode: ScanMode,
        index_hints: &[String],
        doc_count: Option<u64>,
    ) -> PlannerResult<BuiltScan> {
        let alias = source.alias.as_str();
        let keyspace = source.keyspace.as_deref().ok_or_else(|| {
            PlannerError::internal(format!("scan requested for non-keyspace source '{}'", alias))
        })?;
        let indexes = self.catalog.indexes(keyspace);
        let mut violations = Vec::new();

        let pred = Self::eligible_predicate(source, mode);
        let built = match &pred {
            Some(pred) => self.index_path(alias, keyspace, &indexes, pred, index_hints, doc_count, &mut violations),
            None => None,
        };
        if !index_hints.is_empty() && built.is_none() {
            let violation = index_hint_violation(alias, index_hints);
            if !violations.contains(&violation) {
                violations.push(violation);
            }
        }

        let (plan, cost) = match built {
            Some(found) => found,
            None => {
                let primary = indexes.iter().find(|i| i.primary && i.is_online());
                match primary {
                    Some(index) if mode == ScanMode::Standalone => {
                        let cost = self
                            .oracle
                            .zip(doc_count)
                            .and_then(|(o, dc)| o.primary_scan_cost(keyspace, dc));
                        let plan = ScanPlan::PrimaryScan {
                            alias: alias.to_string(),
                            keyspace: keyspace.to_string(),
                            index: index.name.clone(),
                        };
                        (plan, cost)
                    }
                    _ => return Err(PlannerError::no_access_path(alias)),
                }
            }
        };

        let keys = plan.sarg_keys();
        let spanned = Self::eligible_filters(source, mode)
            .into_iter()
            .filter(|f| keys.iter().any(|k| f.expr().contains(k)))
            .map(|f| f.expr().clone())
            .collect();

        let names = plan.index_names().join(",");
        log_event(
            PlanEvent::ScanChosen,
            &[("alias", alias), ("scan", plan.kind()), ("indexes", names.as_str())],
        );
        Ok(BuiltScan {
            plan,
            cost,
            violations,
            spanned,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn index_path(
        &self,
        alias: &str,
        keyspace: &str,
        indexes: &[crate::catalog::IndexDef],
        pred: &Expr,
        index_hints: &[String],
        doc_count: Option<u64>,
        violations: &mut Vec<HintViolation>,
    ) -> Option<(ScanPlan, Option<Cost>)> {
        let req = self.requirements.as_ref();
        if let Some(found) = self.index_scan(alias, keyspace, indexes, pred, index_hints, doc_count, req, violations) {
            return Some(found);
        }

        let disjuncts = pred.disjuncts();
        if disjuncts.len() < 2 {
            return None;
        }
        let mut scans = Vec::with_capacity(disjuncts.len());
        let mut costs = Vec::with_capacity(disjuncts.len());
        for d in disjuncts {
            let (scan, cost) = self.index_scan(alias, keyspace, indexes, d, index_hints, doc_count, None, violations)?;
            scans.push(scan);
            costs.push(cost);
        }
        let cost = sum_costs(&costs);
        Some((
            ScanPlan::UnionScan {
                alias: alias.to_string(),
                scans,
            },
            cost,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn index_scan(
        &self,
        alias: &str,
        keyspace: &str,
        indexes: &[crate::catalog::IndexDef],
        pred: &Expr,
        index_hints: &[String],
        doc_count: Option<u64>,
        req: Option<&ScanRequirements>,
        violations: &mut Vec<HintViolation>,
    ) -> Option<(ScanPlan, Option<Cost>)> {
        let mut candidates = candidate_indexes(alias, indexes, pred, self.fanout_limit);
        if candidates.is_empty() {
            return None;
        }
        if !index_hints.is_empty() {
            let hinted: Vec<IndexEntry> = candidates
                .iter()
                .filter(|c| index_hints.contains(&c.index.name))
                .cloned()
                .collect();
            if hinted.is_empty() {
                let violation = index_hint_violation(alias, index_hints);
                if !violations.contains(&violation) {
                    violations.push(violation);
                }
            } else {
                candidates = hinted;
            }
        }
        let candidates = minimal_indexes(alias, candidates);
        Some(self.choose(alias, keyspace, candidates, doc_count, req))
    }

    /// Cheapest candidate when every candidate has a cost, otherwise an
    /// intersection of all of them. Only a single chosen scan takes
    /// pushdowns.
    fn choose(
        &self,
        alias: &str,
        keyspace: &str,
        mut candidates: Vec<IndexEntry>,
        doc_count: Option<u64>,
        req: Option<&ScanRequirements>,
    ) -> (ScanPlan, Option<Cost>) {
        if let Some(oracle) = self.oracle {
            match doc_count {
                Some(dc) => {
                    for c in candidates.iter_mut() {
                        c.cost = oracle.index_scan_cost(keyspace, &c.index, &c.spans, dc);
                    }
                }
                None => log_event(
                    PlanEvent::CostUnavailable,
                    &[("alias", alias), ("reason", "no document count")],
                ),
            }
            if candidates.iter().all(|c| c.cost.is_some()) {
                let mut best: Option<IndexEntry> = None;
                for c in candidates {
                    let cheaper = match (&best, c.cost) {
                        (None, _) => true,
                        (Some(b), Some(cost)) => b.cost.map_or(true, |bc| cost.cost < bc.cost),
                        (Some(_), None) => false,
                    };
                    if cheaper {
                        best = Some(c);
                    }
                }
                if let Some(best) = best {
                    let cost = best.cost;
                    return (ScanPlan::index_scan(alias, keyspace, best, req), cost);
                }
                return (ScanPlan::DummyScan, None);
            }
            if doc_count.is_some() {
                log_event(
                    PlanEvent::CostUnavailable,
                    &[("alias", alias), ("reason", "no index scan cost")],
                );
            }
        }

        if candidates.len() == 1 {
            if let Some(only) = candidates.pop() {
                return (ScanPlan::index_scan(alias, keyspace, only, req), None);
            }
        }
        candidates.sort_by(|a, b| a.index.name.cmp(&b.index.name));
        let scans = candidates
            .into_iter()
            .map(|c| ScanPlan::index_scan(alias, keyspace, c, None))
            .collect();
        (
            ScanPlan::IntersectScan {
                alias: alias.to_string(),
                scans,
            },
            None,
        )
    }
}

fn index_hint_violation(alias: &str, hints: &[String]) -> HintViolation {
    HintViolation::new(
        alias,
        format!("USE INDEX({})", hints.join(", ")),
        "no hinted index qualifies, considering all indexes",
    )
}

fn sum_costs(costs: &[Option<Cost>]) -> Option<Cost> {
    costs.iter().try_fold(Cost::new(0.0, 0.0, 0.0), |acc, c| {
        c.map(|c| {
            Cost::new(
                acc.cost + c.cost,
                acc.cardinality + c.cardinality,
                acc.first_row.max(c.first_row),
            )
        })
    })
}
