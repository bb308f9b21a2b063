//! Explain output
//!
//! Produces deterministic, human-readable explain output, and the same
//! content as JSON.

use std::fmt;

use serde::Serialize;

use crate::catalog::Cost;
use crate::join::PlanOp;
use crate::sarg::ScanPlan;

use super::errors::PlannerError;
use super::planner::StatementPlan;

/// Explain plan output
#[derive(Debug, Clone, Serialize)]
pub struct ExplainPlan {
    /// Whether planning succeeded
    pub accepted: bool,
    /// Operator tree, one indented line per operator
    pub operators: Vec<String>,
    /// Outer joins turned inner, as `kind alias`
    pub rewritten_joins: Vec<String>,
    /// Hints that were not honored
    pub warnings: Vec<String>,
    pub cost: Option<Cost>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Rejection reason (if rejected)
    pub rejection_reason: Option<String>,
    /// Rejection error code (if rejected)
    pub rejection_code: Option<String>,
}

impl ExplainPlan {
    /// Creates an explain plan from a successful statement plan
    pub fn from_plan(plan: &StatementPlan) -> Self {
        let mut operators = Vec::new();
        for op in &plan.ops {
            render_op(op, 0, &mut operators);
        }
        Self {
            accepted: true,
            operators,
            rewritten_joins: plan
                .rewritten_joins
                .iter()
                .map(|r| format!("{} {}", r.kind, r.alias))
                .collect(),
            warnings: plan.warnings.iter().map(|w| w.to_string()).collect(),
            cost: plan.cost,
            limit: plan.limit,
            offset: plan.offset,
            rejection_reason: None,
            rejection_code: None,
        }
    }

    /// Creates an explain plan from a planning error
    pub fn from_error(err: &PlannerError) -> Self {
        Self {
            accepted: false,
            operators: Vec::new(),
            rewritten_joins: Vec::new(),
            warnings: Vec::new(),
            cost: None,
            limit: None,
            offset: None,
            rejection_reason: Some(err.message().to_string()),
            rejection_code: Some(err.code().code().to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn render_op(op: &PlanOp, depth: usize, out: &mut Vec<String>) {
    match op {
        PlanOp::Scan { scan } => render_scan(scan, depth, out),
        PlanOp::HashJoin { child, .. } | PlanOp::NestedLoopJoin { child, .. } => {
            out.push(format!("{}{}", indent(depth), op));
            render_scan(child, depth + 1, out);
        }
        _ => out.push(format!("{}{}", indent(depth), op)),
    }
}

fn render_scan(scan: &ScanPlan, depth: usize, out: &mut Vec<String>) {
    out.push(format!("{}{}", indent(depth), scan));
    if let ScanPlan::IntersectScan { scans, .. } | ScanPlan::UnionScan { scans, .. } = scan {
        for child in scans {
            render_scan(child, depth + 1, out);
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            writeln!(f, "Operators:")?;
            for line in &self.operators {
                writeln!(f, "  {}", line)?;
            }
            if !self.rewritten_joins.is_empty() {
                writeln!(f, "Rewritten to inner: {}", self.rewritten_joins.join(", "))?;
            }
            for warning in &self.warnings {
                writeln!(f, "{}", warning)?;
            }
            match &self.cost {
                Some(c) => writeln!(f, "Cost: {:.2} (cardinality {:.0})", c.cost, c.cardinality)?,
                None => writeln!(f, "Cost: unavailable")?,
            }
            if let Some(limit) = self.limit {
                writeln!(f, "Limit: {}", limit)?;
            }
            if let Some(offset) = self.offset {
                writeln!(f, "Offset: {}", offset)?;
            }
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndexDef, InMemoryCatalog};
    use crate::expr::*;
    use crate::planner::{FromTerm, PlannerConfig, QueryPlanner, SimpleTerm, Statement};
    use serde_json::json;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_index("orders", IndexDef::primary("#primary"))
            .with_index("items", IndexDef::secondary("ix_aid", vec![ident("aid")]))
    }

    fn statement() -> Statement {
        let from = FromTerm::keyspace("a", "orders").join(
            SimpleTerm::keyspace("b", "items"),
            Some(eq(path("a", "id"), path("b", "aid"))),
            false,
        );
        Statement::new(from)
            .with_where(eq(path("b", "y"), constant(json!(5))))
            .with_limit(10)
    }

    #[test]
    fn test_explain_accepted_plan() {
        let cat = catalog();
        let planner = QueryPlanner::new(&cat, PlannerConfig::default());
        let plan = planner.plan(&statement()).unwrap();
        let explain = ExplainPlan::from_plan(&plan);

        assert!(explain.accepted);
        assert_eq!(explain.limit, Some(10));
        assert!(explain.operators[0].starts_with("PrimaryScan #primary"));
        assert!(explain.operators[1].starts_with("NestedLoopJoin b"));
        assert!(explain.operators[2].starts_with("  IndexScan ix_aid"));
        assert!(explain.operators[3].starts_with("Filter"));

        let output = format!("{}", explain);
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains("Cost: unavailable"));
    }

    #[test]
    fn test_explain_rejected_plan() {
        let err = PlannerError::no_access_path("b");
        let explain = ExplainPlan::from_error(&err);

        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code, Some("AERO_PLAN_NO_ACCESS_PATH".into()));

        let output = format!("{}", explain);
        assert!(output.contains("REJECTED"));
        assert!(output.contains("AERO_PLAN_NO_ACCESS_PATH"));
    }

    #[test]
    fn test_explain_json() {
        let cat = catalog();
        let planner = QueryPlanner::new(&cat, PlannerConfig::default());
        let plan = planner.plan(&statement()).unwrap();
        let value = ExplainPlan::from_plan(&plan).to_json();
        assert_eq!(value["accepted"], json!(true));
        assert_eq!(value["operators"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn test_explain_deterministic() {
        let cat = catalog();
        let planner = QueryPlanner::new(&cat, PlannerConfig::default());
        let plan = planner.plan(&statement()).unwrap();
        let explain1 = format!("{}", ExplainPlan::from_plan(&plan));
        let explain2 = format!("{}", ExplainPlan::from_plan(&plan));
        assert_eq!(explain1, explain2);
    }
}
