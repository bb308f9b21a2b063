//! Statement planning
//!
//! The planner turns a [`Statement`] into a [`StatementPlan`]: an ordered
//! list of physical operators with one access path per FROM alias and one
//! join method per JOIN or NEST.
//!
//! # Design Principles
//!
//! - Deterministic: same statement, catalog and oracle give the same plan
//! - Rule-based unless a cost oracle is supplied
//! - Hints are honored when feasible and reported when not
//! - No partial plans: a statement is planned entirely or rejected

mod config;
mod errors;
mod explain;
mod hints;
#[allow(clippy::module_inception)]
mod planner;
mod statement;

pub use config::{ConfigError, PlannerConfig};
pub use errors::{HintViolation, PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use explain::ExplainPlan;
pub use hints::{HashSide, Hints, JoinHint};
pub use planner::{QueryPlanner, StatementPlan};
pub use statement::{
    ExpressionTerm, FromTerm, JoinTerm, KeyspaceTerm, OrderTerm, SimpleTerm, Statement, SubqueryTerm,
    UnnestTerm,
};
