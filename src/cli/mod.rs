//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - plan: Plan one JSON statement against a JSON catalog
//! - check-config: Validate a planner configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, OutputFormat};
pub use commands::{check_config, plan, render_plan, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_json, read_input, write_output};
