//! CLI command implementations
//!
//! Commands are thin: load inputs, configure logging, call the planner,
//! render. No planning logic lives here.

use std::path::Path;

use crate::catalog::InMemoryCatalog;
use crate::observability::Logger;
use crate::planner::{ExplainPlan, PlannerConfig, QueryPlanner, Statement};

use super::args::{Command, OutputFormat};
use super::errors::CliResult;
use super::io::{parse_json, read_input, write_output};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Plan {
            catalog,
            statement,
            config,
            format,
        } => plan(&catalog, &statement, config.as_deref(), format),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Configuration from `path`, or the defaults when no file is given.
fn load_config(path: Option<&Path>) -> CliResult<PlannerConfig> {
    let config = match path {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };
    Logger::set_min_severity(config.log_severity());
    Ok(config)
}

/// Plan command: print the plan of one statement
pub fn plan(
    catalog_path: &Path,
    statement_path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    let output = render_plan(catalog_path, statement_path, config_path, format)?;
    write_output(&output)
}

/// Plans the statement and renders it in `format`.
pub fn render_plan(
    catalog_path: &Path,
    statement_path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> CliResult<String> {
    let config = load_config(config_path)?;
    let catalog: InMemoryCatalog = parse_json("catalog", &read_input(catalog_path)?)?;
    let statement: Statement = parse_json("statement", &read_input(statement_path)?)?;

    let planner = QueryPlanner::new(&catalog, config);
    let plan = planner.plan(&statement)?;
    let explain = ExplainPlan::from_plan(&plan);

    Ok(match format {
        OutputFormat::Text => explain.to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&explain.to_json())?,
    })
}

/// Check-config command: validate and print the effective configuration
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = load_config(Some(config_path))?;
    write_output(&serde_json::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn catalog_json() -> serde_json::Value {
        json!({"keyspaces": {"orders": {
            "doc_count": 100,
            "indexes": [
                {"name": "#primary", "primary": true},
                {"name": "ix_x", "keys": [{"expr": {"identifier": "x"}}]}
            ]
        }}})
    }

    fn statement_json() -> serde_json::Value {
        json!({
            "from": {"keyspace": {"alias": "o", "keyspace": "orders"}},
            "where": {"eq": [{"field": [{"identifier": "o"}, "x"]}, {"constant": 3}]}
        })
    }

    #[test]
    fn test_render_text_plan() {
        let dir = TempDir::new().unwrap();
        let catalog = write(&dir, "catalog.json", catalog_json());
        let statement = write(&dir, "statement.json", statement_json());

        let out = render_plan(&catalog, &statement, None, OutputFormat::Text).unwrap();
        assert!(out.contains("Status: ACCEPTED"));
        assert!(out.contains("IndexScan ix_x"));
    }

    #[test]
    fn test_render_json_plan() {
        let dir = TempDir::new().unwrap();
        let catalog = write(&dir, "catalog.json", catalog_json());
        let statement = write(&dir, "statement.json", statement_json());

        let out = render_plan(&catalog, &statement, None, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["accepted"], json!(true));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let catalog = write(&dir, "catalog.json", catalog_json());
        let statement = write(&dir, "statement.json", statement_json());
        let config = write(&dir, "config.json", json!({"span_fanout_limit": 0}));

        let err = render_plan(&catalog, &statement, Some(&config), OutputFormat::Text).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_rejected_statement() {
        let dir = TempDir::new().unwrap();
        let catalog = write(&dir, "catalog.json", json!({"keyspaces": {}}));
        let statement = write(&dir, "statement.json", statement_json());

        let err = render_plan(&catalog, &statement, None, OutputFormat::Text).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_PLAN_REJECTED");
        assert!(err.message().contains("AERO_PLAN_NO_ACCESS_PATH"));
    }
}
