//! Input and output for the CLI
//!
//! Inputs are UTF-8 JSON documents read from a file, or from stdin when
//! the path is `-`. Output goes to stdout.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;

use super::errors::{CliError, CliResult};

/// Read the whole input named by `path`.
pub fn read_input(path: &Path) -> CliResult<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        io::stdin().lock().read_to_string(&mut content)?;
        return Ok(content);
    }
    fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("cannot read {}: {}", path.display(), e)))
}

/// Parse `content` as `T`; `what` names the input in errors.
pub fn parse_json<T: DeserializeOwned>(what: &str, content: &str) -> CliResult<T> {
    if content.trim().is_empty() {
        return Err(CliError::io_error(format!("empty {}", what)));
    }
    serde_json::from_str(content).map_err(|e| CliError::invalid_input(what, e))
}

/// Write `text` to stdout with a trailing newline.
pub fn write_output(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", text.trim_end())?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlannerConfig;
    use std::io::Write as _;

    #[test]
    fn test_read_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        assert_eq!(read_input(file.path()).unwrap(), "{}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_input(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_IO_ERROR");
    }

    #[test]
    fn test_parse_json_errors() {
        let err = parse_json::<PlannerConfig>("config", "  ").unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_IO_ERROR");
        let err = parse_json::<PlannerConfig>("config", "[1]").unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_INVALID_INPUT");
        assert!(err.message().starts_with("invalid config"));
    }
}
