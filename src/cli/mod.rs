//! Command line interface
//!
//! Reads rows as JSON lines and versions them into a SQLite table
//! described by a JSON config file.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, run, run_command, sync, sync_rows, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
