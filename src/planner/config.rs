//! Planner configuration
//!
//! Every field has a default, so `{}` is a valid configuration file.
//! The presence of a cost oracle is not configured here: cost-based mode
//! is on exactly when the caller hands the planner an oracle.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read planner config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid planner config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid planner config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Whether hash joins may be considered at all
    #[serde(default = "default_true")]
    pub hash_join_enabled: bool,

    /// Whether filters get a selectivity from the cost oracle
    #[serde(default = "default_true")]
    pub selectivity_enabled: bool,

    /// Upper bound on terms produced by OR-over-AND distribution
    #[serde(default = "default_max_dnf_complexity")]
    pub max_dnf_complexity: usize,

    /// Upper bound on spans in one term after IN/OR expansion and
    /// composite-key products
    #[serde(default = "default_span_fanout_limit")]
    pub span_fanout_limit: usize,

    /// Minimum log severity (TRACE, INFO, WARN, ERROR)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_max_dnf_complexity() -> usize {
    1024
}
fn default_span_fanout_limit() -> usize {
    8192
}
fn default_log_level() -> String {
    "WARN".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hash_join_enabled: default_true(),
            selectivity_enabled: default_true(),
            max_dnf_complexity: default_max_dnf_complexity(),
            span_fanout_limit: default_span_fanout_limit(),
            log_level: default_log_level(),
        }
    }
}

impl PlannerConfig {
    /// Hash joins and selectivity estimation switched off.
    pub fn rule_based() -> Self {
        Self {
            hash_join_enabled: false,
            selectivity_enabled: false,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dnf_complexity == 0 {
            return Err(ConfigError::Invalid(
                "max_dnf_complexity must be positive".into(),
            ));
        }
        if self.span_fanout_limit == 0 {
            return Err(ConfigError::Invalid("span_fanout_limit must be positive".into()));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level '{}'",
                self.log_level
            )));
        }
        Ok(())
    }

    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Warn)
    }
}
