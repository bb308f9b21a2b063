//! Planner counters
//!
//! Counters only, monotonic, relaxed atomics. One registry may be shared by
//! planners on several threads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct PlannerMetrics {
    statements_planned: AtomicU64,
    statements_rejected: AtomicU64,
    outer_joins_rewritten: AtomicU64,
    hash_joins: AtomicU64,
    nested_loop_joins: AtomicU64,
    lookup_joins: AtomicU64,
    hint_violations: AtomicU64,
}

impl PlannerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_planned(&self) {
        self.statements_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.statements_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_outer_joins_rewritten(&self, n: u64) {
        self.outer_joins_rewritten.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_hash_joins(&self) {
        self.hash_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_nested_loop_joins(&self) {
        self.nested_loop_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_lookup_joins(&self) {
        self.lookup_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_hint_violations(&self, n: u64) {
        self.hint_violations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            statements_planned: self.statements_planned.load(Ordering::Relaxed),
            statements_rejected: self.statements_rejected.load(Ordering::Relaxed),
            outer_joins_rewritten: self.outer_joins_rewritten.load(Ordering::Relaxed),
            hash_joins: self.hash_joins.load(Ordering::Relaxed),
            nested_loop_joins: self.nested_loop_joins.load(Ordering::Relaxed),
            lookup_joins: self.lookup_joins.load(Ordering::Relaxed),
            hint_violations: self.hint_violations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub statements_planned: u64,
    pub statements_rejected: u64,
    pub outer_joins_rewritten: u64,
    pub hash_joins: u64,
    pub nested_loop_joins: u64,
    pub lookup_joins: u64,
    pub hint_violations: u64,
}
