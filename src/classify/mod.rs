//! Predicate classification
//!
//! [`Normalizer`] rewrites one predicate locally (NOT push-down, BETWEEN and
//! prefix LIKE to ranges, flattening). [`Classifier`] walks a WHERE or ON
//! expression and files the resulting fragments in the filter registry.

mod classifier;
mod normalize;

pub use classifier::{Classifier, Estimator};
pub use normalize::{like_prefix, Normalizer};
