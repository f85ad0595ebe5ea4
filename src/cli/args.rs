//! CLI argument definitions using clap
//!
//! Commands:
//! - table-versioning sync --config <path> [--input <path>]
//! - table-versioning check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Type-2 slowly changing dimension versioning for SQL tables
#[derive(Parser, Debug)]
#[command(name = "table-versioning")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Version JSON-lines rows into the configured table
    Sync {
        /// Path to configuration file
        #[arg(long, default_value = "./versioning.json")]
        config: PathBuf,

        /// JSON-lines input file (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./versioning.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "table-versioning",
            "sync",
            "--config",
            "c.json",
            "--input",
            "rows.jsonl",
        ])
        .unwrap();
        match cli.command {
            Command::Sync { config, input } => {
                assert_eq!(config, PathBuf::from("c.json"));
                assert_eq!(input, Some(PathBuf::from("rows.jsonl")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_check_config_default_path() {
        let cli = Cli::try_parse_from(["table-versioning", "check-config"]).unwrap();
        match cli.command {
            Command::CheckConfig { config } => {
                assert_eq!(config, PathBuf::from("./versioning.json"))
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
