//! Planner error types
//!
//! Error codes:
//! - AERO_PLAN_INTERNAL (FATAL)
//! - AERO_PLAN_NO_ACCESS_PATH (REJECT, recoverable by another branch)
//! - AERO_PLAN_NO_JOIN_PATH (REJECT, recoverable by another branch)
//! - AERO_PLAN_INVALID_STATEMENT (REJECT)
//!
//! Hint inconsistencies are never errors; see [`HintViolation`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Statement cannot be planned as written
    Reject,
    /// Planner state is inconsistent; the compilation is abandoned
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// An internal invariant does not hold
    AeroPlanInternal,
    /// No index and no primary scan can serve a data source
    AeroPlanNoAccessPath,
    /// The nested-loop branch found no index and no key lookup
    AeroPlanNoJoinPath,
    /// Statement shape is invalid
    AeroPlanInvalidStatement,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::AeroPlanInternal => "AERO_PLAN_INTERNAL",
            PlannerErrorCode::AeroPlanNoAccessPath => "AERO_PLAN_NO_ACCESS_PATH",
            PlannerErrorCode::AeroPlanNoJoinPath => "AERO_PLAN_NO_JOIN_PATH",
            PlannerErrorCode::AeroPlanInvalidStatement => "AERO_PLAN_INVALID_STATEMENT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlannerErrorCode::AeroPlanInternal => Severity::Fatal,
            _ => Severity::Reject,
        }
    }

    /// Whether an alternative join branch may absorb this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlannerErrorCode::AeroPlanNoAccessPath | PlannerErrorCode::AeroPlanNoJoinPath
        )
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error with full context
#[derive(Debug, Clone, Error)]
#[error("[{}] {}: {}", .code.severity(), .code, .message)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    alias: Option<String>,
}

impl PlannerError {
    /// Internal invariant violation. `invariant` names what should have held.
    pub fn internal(invariant: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::AeroPlanInternal,
            message: format!("invariant violated: {}", invariant.into()),
            alias: None,
        }
    }

    /// Alias expected in the filter registry is absent.
    pub fn missing_alias(alias: &str) -> Self {
        Self {
            code: PlannerErrorCode::AeroPlanInternal,
            message: format!("invariant violated: alias '{}' is not registered", alias),
            alias: Some(alias.to_string()),
        }
    }

    pub fn no_access_path(alias: &str) -> Self {
        Self {
            code: PlannerErrorCode::AeroPlanNoAccessPath,
            message: format!("no index or primary scan available for '{}'", alias),
            alias: Some(alias.to_string()),
        }
    }

    pub fn no_join_path(alias: &str, reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::AeroPlanNoJoinPath,
            message: format!("no nested-loop path for '{}': {}", alias, reason.into()),
            alias: Some(alias.to_string()),
        }
    }

    pub fn invalid_statement(reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::AeroPlanInvalidStatement,
            message: reason.into(),
            alias: None,
        }
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Alias the error is attributed to, if any.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

/// A hint that could not be honored. Warning-level, planning continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HintViolation {
    pub alias: String,
    pub hint: String,
    pub reason: String,
}

impl HintViolation {
    pub fn new(alias: &str, hint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            alias: alias.to_string(),
            hint: hint.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[WARN] hint {} on '{}' ignored: {}", self.hint, self.alias, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PlannerErrorCode::AeroPlanInternal.code(), "AERO_PLAN_INTERNAL");
        assert_eq!(PlannerErrorCode::AeroPlanNoAccessPath.code(), "AERO_PLAN_NO_ACCESS_PATH");
        assert_eq!(PlannerErrorCode::AeroPlanNoJoinPath.code(), "AERO_PLAN_NO_JOIN_PATH");
        assert_eq!(
            PlannerErrorCode::AeroPlanInvalidStatement.code(),
            "AERO_PLAN_INVALID_STATEMENT"
        );
    }

    #[test]
    fn test_internal_is_fatal_and_not_recoverable() {
        let err = PlannerError::missing_alias("b");
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(!err.is_recoverable());
        assert_eq!(err.alias(), Some("b"));
    }

    #[test]
    fn test_path_errors_recoverable() {
        assert!(PlannerError::no_access_path("a").is_recoverable());
        assert!(PlannerError::no_join_path("a", "no index").is_recoverable());
        assert!(!PlannerError::invalid_statement("dup").is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = PlannerError::no_join_path("b", "no qualifying index");
        let display = format!("{}", err);
        assert!(display.starts_with("[REJECT] AERO_PLAN_NO_JOIN_PATH"));
        assert!(display.contains("no qualifying index"));
    }

    #[test]
    fn test_hint_violation_display() {
        let v = HintViolation::new("b", "USE HASH(PROBE)", "outer join must build right");
        assert!(v.to_string().contains("USE HASH(PROBE)"));
    }
}
