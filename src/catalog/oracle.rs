//! Cost oracle capability
//!
//! Every estimate is optional. `None` means "no statistics" and makes the
//! decision that needed it fall back to the rule-based default.

use serde::Serialize;

use crate::expr::Expr;
use crate::sarg::SargSpans;

use super::IndexDef;

/// Estimated cost of an operator subtree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cost {
    /// Cost to produce every row
    pub cost: f64,
    /// Estimated row count
    pub cardinality: f64,
    /// Cost to produce the first row
    pub first_row: f64,
}

impl Cost {
    pub fn new(cost: f64, cardinality: f64, first_row: f64) -> Self {
        Self {
            cost,
            cardinality,
            first_row,
        }
    }

    /// Cost to produce `limit` rows, interpolated between first-row and
    /// full cost by the fraction of the cardinality consumed.
    pub fn limited(&self, limit: u64) -> f64 {
        if self.cardinality <= 0.0 {
            return self.cost;
        }
        let fraction = (limit as f64 / self.cardinality).min(1.0);
        self.first_row + (self.cost - self.first_row) * fraction
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMethod {
    Hash { build_right: bool },
    NestedLoop,
    KeyLookup,
}

/// What the oracle is asked to cost for one join node.
#[derive(Debug, Clone)]
pub struct JoinShape<'a> {
    /// Alias of the right-hand term
    pub alias: &'a str,
    pub method: JoinMethod,
    pub outer: bool,
    pub nest: bool,
    /// Cost of everything joined so far
    pub left: Option<Cost>,
    /// Cost of the right-hand access path
    pub right: Option<Cost>,
    /// ON-clause of the join, if any
    pub onclause: Option<&'a Expr>,
}

pub trait CostOracle {
    /// Fraction of `alias`'s documents satisfying `expr`.
    fn selectivity(&self, expr: &Expr, alias: &str, doc_count: u64) -> Option<f64>;

    fn index_scan_cost(
        &self,
        keyspace: &str,
        index: &IndexDef,
        spans: &SargSpans,
        doc_count: u64,
    ) -> Option<Cost>;

    fn primary_scan_cost(&self, keyspace: &str, doc_count: u64) -> Option<Cost>;

    fn join_cost(&self, shape: &JoinShape<'_>) -> Option<Cost>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limited_cost_interpolates() {
        let c = Cost::new(100.0, 1000.0, 10.0);
        assert_eq!(c.limited(0), 10.0);
        assert_eq!(c.limited(500), 55.0);
        assert_eq!(c.limited(5000), 100.0);
    }

    #[test]
    fn test_limited_cost_without_cardinality() {
        let c = Cost::new(42.0, 0.0, 1.0);
        assert_eq!(c.limited(10), 42.0);
    }
}
