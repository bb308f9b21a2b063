//! Optimizer hints attached to keyspace terms

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::HintViolation;

/// Which side of a hash join the hinted term should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashSide {
    Build,
    Probe,
    /// `USE HASH` without a side
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinHint {
    UseHash(HashSide),
    UseNl,
}

impl fmt::Display for JoinHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinHint::UseHash(HashSide::Build) => write!(f, "USE HASH(BUILD)"),
            JoinHint::UseHash(HashSide::Probe) => write!(f, "USE HASH(PROBE)"),
            JoinHint::UseHash(HashSide::Either) => write!(f, "USE HASH"),
            JoinHint::UseNl => write!(f, "USE NL"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hints {
    #[serde(default)]
    pub join: Vec<JoinHint>,
    /// `USE INDEX(...)` names
    #[serde(default)]
    pub index: Vec<String>,
}

impl Hints {
    pub fn use_hash(side: HashSide) -> Self {
        Self {
            join: vec![JoinHint::UseHash(side)],
            index: Vec::new(),
        }
    }

    pub fn use_nl() -> Self {
        Self {
            join: vec![JoinHint::UseNl],
            index: Vec::new(),
        }
    }

    pub fn use_index(names: &[&str]) -> Self {
        Self {
            join: Vec::new(),
            index: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The single join hint in force for `alias`.
    ///
    /// Repeats of one hint collapse. Two different join hints conflict:
    /// both are dropped and the conflict is reported.
    pub fn join_hint(&self, alias: &str) -> (Option<JoinHint>, Option<HintViolation>) {
        let mut distinct: Vec<JoinHint> = Vec::new();
        for h in &self.join {
            if !distinct.contains(h) {
                distinct.push(*h);
            }
        }
        match distinct.len() {
            0 => (None, None),
            1 => (Some(distinct[0]), None),
            _ => {
                let names: Vec<String> = distinct.iter().map(|h| h.to_string()).collect();
                (
                    None,
                    Some(HintViolation::new(
                        alias,
                        names.join(", "),
                        "conflicting join hints, using the default strategy",
                    )),
                )
            }
        }
    }
}
