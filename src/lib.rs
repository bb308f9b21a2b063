//! aeroquery - deterministic logical-to-physical planning for document
//! queries
//!
//! Predicate classification, outer-join simplification, index
//! sargability and join strategy selection.

pub mod catalog;
pub mod classify;
pub mod cli;
pub mod expr;
pub mod join;
pub mod nullrej;
pub mod observability;
pub mod planner;
pub mod registry;
pub mod sarg;
