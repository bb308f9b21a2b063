//! Predicate classifier
//!
//! Splits a boolean expression into conjunct-level fragments and files each
//! one under the data sources it references. Returns the statically known
//! truth value of the whole expression, if there is one.

use std::collections::BTreeSet;

use crate::catalog::{Catalog, CostOracle};
use crate::expr::{and_all, or_all, Expr};
use crate::observability::{log_event, PlanEvent};
use crate::planner::{PlannerError, PlannerResult};
use crate::registry::{Filter, FilterRegistry};

use super::normalize::Normalizer;

/// Oracle and catalog used to attach selectivities to new filters.
#[derive(Clone, Copy)]
pub struct Estimator<'a> {
    pub oracle: &'a dyn CostOracle,
    pub catalog: &'a dyn Catalog,
}

pub struct Classifier<'r, 'e> {
    registry: &'r mut FilterRegistry,
    normalizer: Normalizer,
    onclause: bool,
    estimator: Option<Estimator<'e>>,
    constant: Option<bool>,
    non_constant: bool,
}

impl<'r, 'e> Classifier<'r, 'e> {
    pub fn new(registry: &'r mut FilterRegistry, normalizer: Normalizer, onclause: bool) -> Self {
        Self {
            registry,
            normalizer,
            onclause,
            estimator: None,
            constant: None,
            non_constant: false,
        }
    }

    pub fn with_estimator(mut self, estimator: Option<Estimator<'e>>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Classifies `expr` into the registry.
    ///
    /// Returns `Some(false)` if any conjunct is statically false, and
    /// `Some(true)` only when every conjunct is statically true.
    pub fn classify(mut self, expr: &Expr) -> PlannerResult<Option<bool>> {
        if self.registry.is_empty() {
            return Err(PlannerError::internal(
                "classification requires at least one data source",
            ));
        }
        self.visit(expr, None)?;

        let (filters, joins) = self.registry.filter_counts();
        let filters = filters.to_string();
        let joins = joins.to_string();
        log_event(
            PlanEvent::FiltersClassified,
            &[
                ("filters", filters.as_str()),
                ("join_filters", joins.as_str()),
                ("onclause", if self.onclause { "true" } else { "false" }),
            ],
        );

        Ok(match self.constant {
            Some(false) => Some(false),
            Some(true) if !self.non_constant => Some(true),
            _ => None,
        })
    }

    fn add_constant(&mut self, value: bool) {
        self.constant = Some(self.constant.unwrap_or(true) && value);
    }

    fn visit(&mut self, expr: &Expr, orig: Option<&Expr>) -> PlannerResult<()> {
        match expr {
            Expr::And(ops) => {
                for (i, op) in ops.iter().enumerate() {
                    self.visit(op, if i == 0 { orig } else { None })?;
                }
                Ok(())
            }
            Expr::Or(_) => self.visit_or(expr, orig),
            _ => self.visit_default(expr, orig),
        }
    }

    fn visit_or(&mut self, expr: &Expr, orig: Option<&Expr>) -> PlannerResult<()> {
        let disjuncts = expr.disjuncts();
        if disjuncts.iter().any(|d| d.static_truth() == Some(true)) {
            self.add_constant(true);
            return Ok(());
        }

        // Only literally false branches and comparisons against a literal
        // MISSING or NULL are pruned. Anything else is kept.
        let remaining: Vec<Expr> = disjuncts
            .into_iter()
            .filter(|d| d.static_truth() != Some(false) && !d.always_unknown())
            .cloned()
            .collect();

        let orig = orig.unwrap_or(expr);
        match or_all(remaining) {
            None => {
                self.add_constant(false);
                Ok(())
            }
            Some(Expr::Or(ops)) => self.visit_default(&Expr::Or(ops), Some(orig)),
            Some(single) => self.visit(&single, Some(orig)),
        }
    }

    fn visit_default(&mut self, expr: &Expr, orig: Option<&Expr>) -> PlannerResult<()> {
        if let Some(truth) = expr.static_truth() {
            self.add_constant(truth);
            return Ok(());
        }
        self.non_constant = true;

        let orig_keyspaces = expr.referenced_aliases(self.registry.aliases());
        if orig_keyspaces.is_empty() {
            return Ok(());
        }

        let normalized = self.normalizer.normalize(expr);
        let orig = orig.unwrap_or(expr);
        match &normalized {
            Expr::And(ops) => {
                for (i, op) in ops.iter().enumerate() {
                    self.visit(op, if i == 0 { Some(orig) } else { None })?;
                }
                return Ok(());
            }
            other if other.static_truth().is_some() => {
                return self.visit_default(other, Some(orig));
            }
            _ => {}
        }

        let mut keyspaces = orig_keyspaces.clone();
        if self.onclause {
            // inside an ON clause, planned aliases act as constants
            let done = self.registry.plan_done_aliases();
            keyspaces.retain(|k| !done.contains(k));
            if keyspaces.is_empty() {
                return Ok(());
            }
        }

        let mut filter = Filter::new(
            normalized.clone(),
            orig.clone(),
            keyspaces.clone(),
            orig_keyspaces,
            self.onclause,
        );

        if keyspaces.len() == 1 {
            let alias = first(&keyspaces)?;
            self.estimate(&mut filter, &alias)?;
            self.registry.add_filter(&alias, filter)
        } else {
            self.registry.add_join_filter(filter)?;
            if let Expr::Or(_) = normalized {
                for alias in &keyspaces {
                    self.derive_single_source(&normalized, alias)?;
                }
            }
            Ok(())
        }
    }

    /// From a multi-source disjunction, builds `OR(d1|alias, ..., dn|alias)`
    /// where `di|alias` is the AND of what disjunct `i` says about `alias`
    /// alone. Gives up if some disjunct says nothing about `alias`.
    fn derive_single_source(&mut self, disjunction: &Expr, alias: &str) -> PlannerResult<()> {
        let mut terms = Vec::new();
        for disjunct in disjunction.disjuncts() {
            let mut scratch = self.registry.copy_without_filters();
            let truth = Classifier::new(&mut scratch, self.normalizer, self.onclause)
                .classify(disjunct)?;
            match truth {
                Some(false) => continue,
                Some(true) => return Ok(()),
                None => {}
            }
            let parts: Vec<Expr> = scratch
                .get(alias)?
                .filters
                .iter()
                .map(|f| f.expr().clone())
                .collect();
            match and_all(parts) {
                Some(term) => terms.push(term),
                None => return Ok(()),
            }
        }

        let derived = match or_all(terms) {
            Some(e) => e,
            None => return Ok(()),
        };
        let refs: BTreeSet<String> = std::iter::once(alias.to_string()).collect();
        let mut filter = Filter::new(
            derived.clone(),
            derived,
            refs.clone(),
            refs,
            self.onclause,
        );
        filter.mark_derived();
        self.estimate(&mut filter, alias)?;
        self.registry.add_filter(alias, filter)
    }

    /// Attaches a selectivity when an oracle is present and the source has
    /// a known document count.
    fn estimate(&mut self, filter: &mut Filter, alias: &str) -> PlannerResult<()> {
        let estimator = match self.estimator {
            Some(e) => e,
            None => return Ok(()),
        };
        match self.registry.document_count(alias, estimator.catalog)? {
            Some(count) => {
                filter.set_selectivity(estimator.oracle.selectivity(filter.expr(), alias, count))
            }
            None => log_event(
                PlanEvent::CostUnavailable,
                &[("alias", alias), ("reason", "no document count")],
            ),
        }
        Ok(())
    }
}

fn first(set: &BTreeSet<String>) -> PlannerResult<String> {
    set.iter()
        .next()
        .cloned()
        .ok_or_else(|| PlannerError::internal("filter references no data source"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cost, IndexDef, InMemoryCatalog, JoinShape};
    use crate::expr::*;
    use crate::planner::PlannerErrorCode;
    use crate::registry::DataSource;
    use crate::sarg::SargSpans;
    use serde_json::json;

    fn registry(aliases: &[&str]) -> FilterRegistry {
        let mut r = FilterRegistry::new();
        for a in aliases {
            r.insert(DataSource::keyspace(a, &format!("ks_{}", a))).unwrap();
        }
        r
    }

    fn classify(r: &mut FilterRegistry, e: &Expr) -> Option<bool> {
        Classifier::new(r, Normalizer::local(1024), false)
            .classify(e)
            .unwrap()
    }

    fn c(v: serde_json::Value) -> Expr {
        constant(v)
    }

    #[test]
    fn test_empty_registry_is_internal_error() {
        let mut r = FilterRegistry::new();
        let err = Classifier::new(&mut r, Normalizer::local(1024), false)
            .classify(&c(json!(true)))
            .unwrap_err();
        assert_eq!(err.code(), PlannerErrorCode::AeroPlanInternal);
    }

    #[test]
    fn test_single_and_join_filters() {
        let mut r = registry(&["a", "b"]);
        let e = and(vec![
            eq(path("a", "x"), c(json!(1))),
            eq(path("a", "id"), path("b", "aid")),
        ]);
        assert_eq!(classify(&mut r, &e), None);
        assert_eq!(r.get("a").unwrap().filters.len(), 1);
        assert_eq!(r.get("a").unwrap().join_filters.len(), 1);
        assert_eq!(r.get("b").unwrap().join_filters.len(), 1);
        assert!(r.get("b").unwrap().filters.is_empty());
    }

    #[test]
    fn test_nested_and_flattened() {
        let mut r = registry(&["a"]);
        let e = and(vec![
            and(vec![eq(path("a", "x"), c(json!(1))), eq(path("a", "y"), c(json!(2)))]),
            and(vec![and(vec![eq(path("a", "z"), c(json!(3)))])]),
        ]);
        classify(&mut r, &e);
        assert_eq!(r.get("a").unwrap().filters.len(), 3);
    }

    #[test]
    fn test_constant_results() {
        let mut r = registry(&["a"]);
        assert_eq!(classify(&mut r, &c(json!(true))), Some(true));
        assert_eq!(
            classify(&mut r, &and(vec![eq(path("a", "x"), c(json!(1))), c(json!(false))])),
            Some(false)
        );
        // true conjunct next to a real filter is not a constant result
        let mut r = registry(&["a"]);
        assert_eq!(
            classify(&mut r, &and(vec![eq(path("a", "x"), c(json!(1))), c(json!(true))])),
            None
        );
    }

    #[test]
    fn test_or_tautology_and_pruning() {
        let mut r = registry(&["a"]);
        let taut = or(vec![eq(path("a", "x"), c(json!(1))), c(json!(true))]);
        assert_eq!(classify(&mut r, &taut), Some(true));
        assert!(r.get("a").unwrap().filters.is_empty());

        let dead = or(vec![c(json!(false)), eq(path("a", "x"), Expr::Missing)]);
        assert_eq!(classify(&mut r, &dead), Some(false));

        let pruned = or(vec![c(json!(false)), eq(path("a", "x"), c(json!(1)))]);
        classify(&mut r, &pruned);
        let filters = &r.get("a").unwrap().filters;
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].expr(), &eq(path("a", "x"), c(json!(1))));
        assert_eq!(filters[0].orig_expr(), &pruned);
    }

    #[test]
    fn test_unprovable_branch_not_pruned() {
        let mut r = registry(&["a"]);
        let e = or(vec![
            eq(path("a", "x"), c(json!(1))),
            eq(path("a", "y"), param("p")),
        ]);
        classify(&mut r, &e);
        assert!(matches!(r.get("a").unwrap().filters[0].expr(), Expr::Or(ops) if ops.len() == 2));
    }

    #[test]
    fn test_alias_free_conjunct_discarded() {
        let mut r = registry(&["a"]);
        let e = and(vec![eq(param("p"), c(json!(1))), eq(path("a", "x"), c(json!(1)))]);
        assert_eq!(classify(&mut r, &e), None);
        assert_eq!(r.get("a").unwrap().filters.len(), 1);
    }

    #[test]
    fn test_not_reveals_and() {
        let mut r = registry(&["a"]);
        let e = not(or(vec![is_null(path("a", "x")), is_null(path("a", "y"))]));
        classify(&mut r, &e);
        let filters = &r.get("a").unwrap().filters;
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].expr(), &is_not_null(path("a", "x")));
        assert_eq!(filters[0].orig_expr(), &e);
        assert_eq!(filters[1].orig_expr(), &is_not_null(path("a", "y")));
    }

    #[test]
    fn test_onclause_ignores_planned_aliases() {
        let mut r = registry(&["a", "b"]);
        r.get_mut("a").unwrap().plan_done = true;
        let e = eq(path("a", "id"), path("b", "aid"));
        Classifier::new(&mut r, Normalizer::local(1024), true)
            .classify(&e)
            .unwrap();
        let b = r.get("b").unwrap();
        assert_eq!(b.filters.len(), 1);
        assert!(b.filters[0].is_join());
        assert!(b.filters[0].is_onclause());
        assert!(r.get("a").unwrap().join_filters.is_empty());
    }

    #[test]
    fn test_derived_filter_from_join_disjunction() {
        let mut r = registry(&["a", "b"]);
        let e = or(vec![
            and(vec![eq(path("a", "x"), c(json!(1))), eq(path("b", "y"), c(json!(2)))]),
            and(vec![eq(path("a", "x"), c(json!(3))), eq(path("b", "z"), c(json!(4)))]),
        ]);
        classify(&mut r, &e);
        let a = r.get("a").unwrap();
        assert_eq!(a.join_filters.len(), 1);
        assert_eq!(a.filters.len(), 1);
        assert!(a.filters[0].is_derived());
        assert_eq!(
            a.filters[0].expr(),
            &or(vec![eq(path("a", "x"), c(json!(1))), eq(path("a", "x"), c(json!(3)))])
        );
        assert_eq!(r.get("b").unwrap().filters.len(), 1);
    }

    #[test]
    fn test_no_derived_filter_when_a_disjunct_is_silent() {
        let mut r = registry(&["a", "b"]);
        let e = or(vec![
            eq(path("a", "x"), path("b", "x")),
            eq(path("a", "y"), c(json!(1))),
        ]);
        classify(&mut r, &e);
        assert!(r.get("a").unwrap().filters.is_empty());
        assert!(r.get("b").unwrap().filters.is_empty());
    }

    struct HalfOracle;

    impl CostOracle for HalfOracle {
        fn selectivity(&self, _: &Expr, _: &str, _: u64) -> Option<f64> {
            Some(0.5)
        }
        fn index_scan_cost(&self, _: &str, _: &IndexDef, _: &SargSpans, _: u64) -> Option<Cost> {
            None
        }
        fn primary_scan_cost(&self, _: &str, _: u64) -> Option<Cost> {
            None
        }
        fn join_cost(&self, _: &JoinShape<'_>) -> Option<Cost> {
            None
        }
    }

    #[test]
    fn test_selectivity_requires_document_count() {
        let catalog = InMemoryCatalog::new().with_keyspace("ks_a", Some(100));
        let oracle = HalfOracle;
        let estimator = Estimator {
            oracle: &oracle,
            catalog: &catalog,
        };
        let mut r = registry(&["a", "b"]);
        let e = and(vec![eq(path("a", "x"), c(json!(1))), eq(path("b", "y"), c(json!(1)))]);
        Classifier::new(&mut r, Normalizer::local(1024), false)
            .with_estimator(Some(estimator))
            .classify(&e)
            .unwrap();
        assert_eq!(r.get("a").unwrap().filters[0].selectivity(), Some(0.5));
        assert_eq!(r.get("b").unwrap().filters[0].selectivity(), None);
    }
}
