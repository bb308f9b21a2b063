//! Sargability and span algebra
//!
//! # Layers
//!
//! - [`span`]: ranges over one key and composite spans
//! - [`SargSpans`]: the span algebra with its sentinels and `streamline`
//! - [`KeySarger`]: how one predicate constrains one index key
//! - [`sarg_for`]: composition across the keys of one index
//! - [`candidate_indexes`] / [`minimal_indexes`]: index candidates per source
//! - [`ScanBuilder`]: the access path chosen for a source
//! - [`Pushdowns`]: covering, order, limit and offset taken by an index scan

mod compose;
mod index;
mod key;
mod pushdown;
pub mod span;
mod spans;
mod scan;

pub use compose::{sarg_for, IndexSarg};
pub use index::{candidate_indexes, minimal_indexes, IndexEntry};
pub use key::KeySarger;
pub use pushdown::{covers, Pushdowns, ScanRequirements};
pub use scan::{BuiltScan, ScanBuilder, ScanMode, ScanPlan};
pub use span::{above_null, Bound, Range, Span};
pub use spans::SargSpans;
