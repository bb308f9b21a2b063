//! Observability for the planner
//!
//! - Structured JSON-line logging with a process-wide threshold
//! - Typed planning events
//! - Counters
//!
//! Observability is read-only: nothing here influences a planning decision.
//!
//! ```ignore
//! use aeroquery::observability::{log_event, PlanEvent};
//!
//! log_event(PlanEvent::JoinMethodChosen, &[("alias", "b"), ("method", "hash")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::PlanEvent;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, PlannerMetrics};

/// Logs `event` at its own severity.
pub fn log_event(event: PlanEvent, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
