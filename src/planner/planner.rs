//! Statement planner
//!
//! Drives one statement compilation, in order:
//!
//! 1. FROM walk into a fresh filter registry
//! 2. Classification of WHERE and inner ON clauses
//! 3. Outer to inner join rewrite, repeated until nothing changes
//! 4. Access path for the first term, then one join decision per JOIN,
//!    NEST or UNNEST in FROM order
//! 5. Trailing filter with the full WHERE clause
//!
//! Deterministic: the same statement, catalog, oracle and configuration
//! always produce the same plan.

use serde::Serialize;

use crate::catalog::{Catalog, Cost, CostOracle};
use crate::classify::{Classifier, Estimator, Normalizer};
use crate::expr::Expr;
use crate::join::{select_join, JoinContext, JoinNode, PlanOp, PlanState};
use crate::nullrej::{rewrite_outer_joins, RewrittenJoin};
use crate::observability::{log_event, PlanEvent, PlannerMetrics};
use crate::registry::{DataSource, FilterFlags, FilterRegistry, SourceKind};
use crate::sarg::{ScanMode, ScanPlan};

use super::config::PlannerConfig;
use super::errors::{HintViolation, PlannerError, PlannerResult};
use super::statement::{FromTerm, SimpleTerm, Statement};

/// Immutable result of planning one statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementPlan {
    /// Operators in execution order
    pub ops: Vec<PlanOp>,
    /// Registry as left after the last join, for advisors
    pub registry: FilterRegistry,
    /// Hints that could not be honored
    pub warnings: Vec<HintViolation>,
    pub rewritten_joins: Vec<RewrittenJoin>,
    /// Estimated cost of the whole plan, when every step had one
    pub cost: Option<Cost>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl StatementPlan {
    fn empty(stmt: &Statement, registry: FilterRegistry, rewritten_joins: Vec<RewrittenJoin>) -> Self {
        Self {
            ops: vec![PlanOp::Scan {
                scan: ScanPlan::DummyScan,
            }],
            registry,
            warnings: Vec::new(),
            rewritten_joins,
            cost: None,
            limit: stmt.limit,
            offset: stmt.offset,
        }
    }

    /// True when the plan provably returns no rows.
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self.ops.as_slice(),
            [PlanOp::Scan {
                scan: ScanPlan::DummyScan
            }]
        )
    }
}

/// Query planner. Cost-based when constructed with an oracle, rule-based
/// otherwise.
pub struct QueryPlanner<'a, C: Catalog> {
    catalog: &'a C,
    oracle: Option<&'a dyn CostOracle>,
    config: PlannerConfig,
    metrics: PlannerMetrics,
}

impl<'a, C: Catalog> QueryPlanner<'a, C> {
    pub fn new(catalog: &'a C, config: PlannerConfig) -> Self {
        Self {
            catalog,
            oracle: None,
            config,
            metrics: PlannerMetrics::new(),
        }
    }

    pub fn with_oracle(mut self, oracle: &'a dyn CostOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PlannerMetrics {
        &self.metrics
    }

    /// Plans a statement, returning an immutable plan or error.
    ///
    /// No partial plan is ever returned.
    pub fn plan(&self, stmt: &Statement) -> PlannerResult<StatementPlan> {
        let mode = if self.oracle.is_some() { "cost_based" } else { "rule_based" };
        log_event(PlanEvent::PlanBegin, &[("mode", mode)]);

        match self.plan_statement(stmt) {
            Ok(plan) => {
                self.record(&plan);
                let ops = plan.ops.len().to_string();
                log_event(PlanEvent::PlanComplete, &[("operators", ops.as_str())]);
                Ok(plan)
            }
            Err(e) => {
                self.metrics.increment_rejected();
                log_event(
                    PlanEvent::PlanRejected,
                    &[("code", e.code().code()), ("message", e.message())],
                );
                Err(e)
            }
        }
    }

    fn record(&self, plan: &StatementPlan) {
        self.metrics.increment_planned();
        self.metrics
            .add_outer_joins_rewritten(plan.rewritten_joins.len() as u64);
        self.metrics.add_hint_violations(plan.warnings.len() as u64);
        for op in &plan.ops {
            match op {
                PlanOp::HashJoin { .. } => self.metrics.increment_hash_joins(),
                PlanOp::NestedLoopJoin { .. } => self.metrics.increment_nested_loop_joins(),
                PlanOp::KeyLookupJoin { .. } => self.metrics.increment_lookup_joins(),
                _ => {}
            }
        }
        for v in &plan.warnings {
            log_event(
                PlanEvent::HintViolation,
                &[
                    ("alias", v.alias.as_str()),
                    ("hint", v.hint.as_str()),
                    ("reason", v.reason.as_str()),
                ],
            );
        }
    }

    fn plan_statement(&self, stmt: &Statement) -> PlannerResult<StatementPlan> {
        let mut from = stmt
            .from
            .clone()
            .ok_or_else(|| PlannerError::invalid_statement("statement has no FROM clause"))?;
        let normalizer = Normalizer::local(self.config.max_dnf_complexity);

        let mut registry = self.register(&from)?;

        let mut always_false = false;
        if let Some(pred) = &stmt.where_clause {
            always_false |= self.classify(&mut registry, normalizer, pred, false)? == Some(false);
        }
        for on in inner_onclauses(&from) {
            always_false |= self.classify(&mut registry, normalizer, on, false)? == Some(false);
        }

        let mut rewritten = Vec::new();
        loop {
            let pass = rewrite_outer_joins(&mut from, &mut registry)?;
            if pass.is_empty() {
                break;
            }
            for join in &pass {
                if let Some(on) = &join.onclause {
                    always_false |= self.classify(&mut registry, normalizer, on, false)? == Some(false);
                }
            }
            rewritten.extend(pass);
        }

        if always_false {
            return Ok(StatementPlan::empty(stmt, registry, rewritten));
        }
        registry.combine_filters();

        let ctx = JoinContext {
            catalog: self.catalog,
            oracle: self.oracle,
            config: &self.config,
            limit: stmt.limit_only(),
            statement: Some(stmt),
        };
        let mut warnings = Vec::new();
        let state = self.plan_from(&ctx, &from, normalizer, PlanState::new(registry), &mut warnings)?;
        let state = match &stmt.where_clause {
            Some(pred) => state.with_op(PlanOp::Filter { expr: pred.clone() }),
            None => state,
        };

        let (ops, registry, cost) = state.into_parts();
        Ok(StatementPlan {
            ops,
            registry,
            warnings,
            rewritten_joins: rewritten,
            cost,
            limit: stmt.limit,
            offset: stmt.offset,
        })
    }

    /// Registry with one source per FROM alias and document counts
    /// prefetched.
    fn register(&self, from: &FromTerm) -> PlannerResult<FilterRegistry> {
        let mut registry = FilterRegistry::new();
        register_term(from, &mut registry)?;

        let aliases = from.aliases();
        if let Some(first) = aliases.first() {
            registry.get_mut(first)?.primary = true;
        }
        for alias in &aliases {
            registry.document_count(alias, self.catalog)?;
        }
        Ok(registry)
    }

    fn classify(
        &self,
        registry: &mut FilterRegistry,
        normalizer: Normalizer,
        expr: &Expr,
        onclause: bool,
    ) -> PlannerResult<Option<bool>> {
        Classifier::new(registry, normalizer, onclause)
            .with_estimator(self.estimator())
            .classify(expr)
    }

    fn estimator(&self) -> Option<Estimator<'_>> {
        match self.oracle {
            Some(oracle) if self.config.selectivity_enabled => Some(Estimator {
                oracle,
                catalog: self.catalog,
            }),
            _ => None,
        }
    }

    fn plan_from(
        &self,
        ctx: &JoinContext<'_>,
        term: &FromTerm,
        normalizer: Normalizer,
        state: PlanState,
        warnings: &mut Vec<HintViolation>,
    ) -> PlannerResult<PlanState> {
        match term {
            FromTerm::Keyspace(t) => {
                if !t.hints.join.is_empty() {
                    let names: Vec<String> = t.hints.join.iter().map(|h| h.to_string()).collect();
                    warnings.push(HintViolation::new(
                        &t.alias,
                        names.join(", "),
                        "the first FROM term is not the right side of a join",
                    ));
                }
                let source = state.registry().get(&t.alias)?;
                let built = ctx.scan_builder(&t.alias).build(
                    source,
                    ScanMode::Standalone,
                    &t.hints.index,
                    source.cached_document_count(),
                )?;
                warnings.extend(built.violations);
                state
                    .with_planned(PlanOp::Scan { scan: built.plan }, Some(&t.alias), built.cost)?
                    .flag_filters(&t.alias, &built.spanned, FilterFlags::INDEX_SPAN)
            }
            FromTerm::Expression(t) => {
                let scan = ScanPlan::ExpressionScan {
                    alias: t.alias.clone(),
                    expr: t.expr.clone(),
                    correlated: false,
                };
                state.with_planned(PlanOp::Scan { scan }, Some(&t.alias), None)
            }
            FromTerm::Subquery(t) => {
                let scan = ScanPlan::SubqueryScan {
                    alias: t.alias.clone(),
                    text: t.text.clone(),
                    correlated: t.correlated,
                };
                state.with_planned(PlanOp::Scan { scan }, Some(&t.alias), None)
            }
            FromTerm::Join(j) => {
                let mut state = self.plan_from(ctx, &j.left, normalizer, state, warnings)?;
                if j.outer {
                    if let Some(on) = &j.onclause {
                        state = state.with_registry(|r| {
                            self.classify(r, normalizer, on, true)?;
                            r.combine_filters();
                            Ok(())
                        })?;
                    }
                }
                let node = JoinNode {
                    right: &j.right,
                    onclause: j.onclause.as_ref(),
                    outer: j.outer,
                    nest: j.nest,
                };
                let branch = select_join(ctx, &state, &node)?;
                warnings.extend(branch.violations);
                Ok(branch.state)
            }
            FromTerm::Unnest(u) => {
                let state = self.plan_from(ctx, &u.left, normalizer, state, warnings)?;
                let op = PlanOp::Unnest {
                    alias: u.alias.clone(),
                    expr: u.expr.clone(),
                    outer: u.outer,
                };
                let cost = state.cost();
                state.with_planned(op, Some(&u.alias), cost)
            }
        }
    }
}

fn source_for(term: &SimpleTerm) -> DataSource {
    match term {
        SimpleTerm::Keyspace(t) => DataSource::keyspace(&t.alias, &t.keyspace),
        SimpleTerm::Expression(t) => DataSource::new(&t.alias, None, SourceKind::Expression),
        SimpleTerm::Subquery(t) => DataSource::new(&t.alias, None, SourceKind::Subquery),
    }
}

fn register_term(term: &FromTerm, registry: &mut FilterRegistry) -> PlannerResult<()> {
    match term {
        FromTerm::Keyspace(t) => registry.insert(DataSource::keyspace(&t.alias, &t.keyspace)),
        FromTerm::Expression(t) => registry.insert(DataSource::new(&t.alias, None, SourceKind::Expression)),
        FromTerm::Subquery(t) => registry.insert(DataSource::new(&t.alias, None, SourceKind::Subquery)),
        FromTerm::Join(j) => {
            register_term(&j.left, registry)?;
            let mut source = source_for(&j.right);
            if j.outer {
                source.outer_level = 1;
            }
            registry.insert(source)
        }
        FromTerm::Unnest(u) => {
            register_term(&u.left, registry)?;
            if registry.contains(&u.alias) {
                return Err(PlannerError::invalid_statement(format!(
                    "duplicate alias '{}'",
                    u.alias
                )));
            }
            let mut source = DataSource::new(&u.alias, None, SourceKind::Unnest);
            source.outer_level = u32::from(u.outer);

            // an unnest is as outer as the document it unnests
            let parent = u.expr.referenced_aliases(registry.aliases()).into_iter().next();
            if let Some(parent) = parent {
                let p = registry.get_mut(&parent)?;
                source.outer_level += p.outer_level;
                p.unnests.insert(u.alias.clone());
                source.unnest_of = Some(parent);
            }
            registry.insert(source)
        }
    }
}

/// ON clauses of inner joins and nests, left to right.
fn inner_onclauses(term: &FromTerm) -> Vec<&Expr> {
    match term {
        FromTerm::Join(j) => {
            let mut out = inner_onclauses(&j.left);
            if !j.outer {
                out.extend(j.onclause.as_ref());
            }
            out
        }
        FromTerm::Unnest(u) => inner_onclauses(&u.left),
        _ => Vec::new(),
    }
}
