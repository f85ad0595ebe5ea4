//! JSON-lines I/O for the CLI
//!
//! - Input: one JSON object per line, from a file or stdin
//! - Output: one JSON object per line on stdout
//! - Blank lines are skipped; line numbers count them anyway

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Open the input, falling back to stdin.
pub fn open_input(path: Option<&Path>) -> CliResult<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path).map_err(|e| {
                CliError::io_error(format!("cannot open {}: {}", path.display(), e))
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Parse JSON lines, yielding `(line_number, value)`.
pub fn read_lines<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<(usize, Value)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let number = index + 1;
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(
                    serde_json::from_str(&line)
                        .map(|value| (number, value))
                        .map_err(|e| CliError::input_error(number, e)),
                ),
                Err(e) => Some(Err(CliError::from(e))),
            }
        })
}

/// Write one JSON value as a line.
pub fn write_line<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
