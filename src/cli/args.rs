//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery plan --catalog <path> --statement <path> [--config <path>] [--format text|json]
//! - aeroquery check-config --config <path>

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// aeroquery - deterministic query planning for document statements
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan one statement against a catalog and print the plan
    Plan {
        /// Path to the catalog JSON file
        #[arg(long)]
        catalog: PathBuf,

        /// Path to the statement JSON file, or `-` for stdin
        #[arg(long)]
        statement: PathBuf,

        /// Path to the planner configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate a planner configuration file and print the effective values
    CheckConfig {
        /// Path to the planner configuration file
        #[arg(long)]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
