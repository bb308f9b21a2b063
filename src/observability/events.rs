//! Typed planning events

use std::fmt;

use super::logger::Severity;

/// Observable planning events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEvent {
    // Statement lifecycle
    PlanBegin,
    PlanComplete,
    PlanRejected,

    // Predicate analysis
    FiltersClassified,
    OuterJoinRewritten,

    // Access paths
    IndexCandidatesPruned,
    ScanChosen,

    // Joins
    JoinHashAttempt,
    JoinNestedLoopAttempt,
    JoinMethodChosen,

    // Degraded decisions
    HintViolation,
    CostUnavailable,
}

impl PlanEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanEvent::PlanBegin => "PLAN_BEGIN",
            PlanEvent::PlanComplete => "PLAN_COMPLETE",
            PlanEvent::PlanRejected => "PLAN_REJECTED",
            PlanEvent::FiltersClassified => "FILTERS_CLASSIFIED",
            PlanEvent::OuterJoinRewritten => "OUTER_JOIN_REWRITTEN",
            PlanEvent::IndexCandidatesPruned => "INDEX_CANDIDATES_PRUNED",
            PlanEvent::ScanChosen => "SCAN_CHOSEN",
            PlanEvent::JoinHashAttempt => "JOIN_HASH_ATTEMPT",
            PlanEvent::JoinNestedLoopAttempt => "JOIN_NL_ATTEMPT",
            PlanEvent::JoinMethodChosen => "JOIN_METHOD_CHOSEN",
            PlanEvent::HintViolation => "HINT_VIOLATION",
            PlanEvent::CostUnavailable => "COST_UNAVAILABLE",
        }
    }

    /// Severity the event is logged at.
    pub fn severity(&self) -> Severity {
        match self {
            PlanEvent::PlanRejected => Severity::Error,
            PlanEvent::HintViolation | PlanEvent::CostUnavailable => Severity::Warn,
            PlanEvent::PlanBegin
            | PlanEvent::PlanComplete
            | PlanEvent::OuterJoinRewritten
            | PlanEvent::JoinMethodChosen => Severity::Info,
            PlanEvent::FiltersClassified
            | PlanEvent::IndexCandidatesPruned
            | PlanEvent::ScanChosen
            | PlanEvent::JoinHashAttempt
            | PlanEvent::JoinNestedLoopAttempt => Severity::Trace,
        }
    }
}

impl fmt::Display for PlanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
