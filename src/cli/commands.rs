//! CLI command implementations
//!
//! - `sync`: load config, open a session, version each input row, print
//!   one result line per row, finish the session, print the line counters
//! - `check-config`: load and validate config only
//!
//! An input object may carry a `_status` key (`identical` or `purged`) to
//! force the status of that row. The key is not written to the table.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{open_input, read_lines, write_line};
use crate::compare::RowStatus;
use crate::observability::{Logger, MetricsRegistry, Severity};
use crate::storage::SqliteConnector;
use crate::versioning::{Versioning, VersioningOptions};

/// Input key forcing the status of a row
pub const STATUS_KEY: &str = "_status";

/// Database path selecting an in-memory database
pub const MEMORY_DATABASE: &str = ":memory:";

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file, or ":memory:"
    pub database: String,

    /// SQL run on every new connection (optional)
    #[serde(default)]
    pub init_sql: Option<String>,

    /// Minimum log severity (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// The versioned table
    pub versioning: VersioningOptions,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load config from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate config text
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config
    pub fn validate(&self) -> CliResult<()> {
        if self.database.trim().is_empty() {
            return Err(CliError::config_error("database is required"));
        }
        self.severity()?;
        self.versioning.validate()?;
        Ok(())
    }

    /// Parsed log level
    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level.parse().map_err(CliError::config_error)
    }

    /// Connector for the configured database
    pub fn connector(&self) -> SqliteConnector {
        let connector = if self.database == MEMORY_DATABASE {
            SqliteConnector::memory()
        } else {
            SqliteConnector::file(PathBuf::from(&self.database))
        };
        match &self.init_sql {
            Some(sql) => connector.with_init_sql(sql.clone()),
            None => connector,
        }
    }
}

/// Run the CLI
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run a specific command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Sync { config, input } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            sync(&config, input.as_deref(), &mut out)
        }
        Command::CheckConfig { config } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            check_config(&config, &mut out)
        }
    }
}

/// Version JSON-lines input into the configured table
pub fn sync<W: Write>(config_path: &Path, input: Option<&Path>, out: &mut W) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity()?);
    let reader = open_input(input)?;
    sync_rows(&config, reader, out)
}

/// Version rows read from `reader`.
pub fn sync_rows<R: io::BufRead, W: Write>(
    config: &Config,
    reader: R,
    out: &mut W,
) -> CliResult<()> {
    let metrics = Arc::new(MetricsRegistry::new());
    let mut session = Versioning::open(config.versioning.clone(), Box::new(config.connector()))?
        .with_counters(metrics.clone());
    // Rows lost to a transient failure are reported and the run goes on
    session.set_recovery_callback(|error, rows| {
        Logger::warn(
            "SYNC_ROWS_DROPPED",
            &[
                ("error", &error.to_string()),
                ("rows", &rows.len().to_string()),
            ],
        );
        true
    })?;

    for line in read_lines(reader) {
        let (number, mut json) = line?;
        let status = take_status(number, &mut json)?;
        let row = config
            .versioning
            .fields
            .row_from_json(&json)
            .map_err(|e| CliError::input_error(number, e))?;
        match session.process_as(row, status)? {
            Some(result) => write_line(out, &result.to_json())?,
            None => write_line(out, &json!({ "line": number, "recovered": true }))?,
        }
    }

    session.finish()?;
    let snapshot: JsonValue = serde_json::from_str(&metrics.to_json())?;
    write_line(out, &json!({ "metrics": snapshot }))
}

/// Validate config without touching the database
pub fn check_config<W: Write>(config_path: &Path, out: &mut W) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let options = &config.versioning;
    write_line(
        out,
        &json!({
            "status": "ok",
            "table": options.layout().table_path(),
            "fields": options.fields.len(),
            "purge": options.purge,
        }),
    )
}

fn take_status(line: usize, json: &mut JsonValue) -> CliResult<Option<RowStatus>> {
    let removed = match json.as_object_mut() {
        Some(object) => object.remove(STATUS_KEY),
        None => return Err(CliError::input_error(line, "expected a JSON object")),
    };
    match removed {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|e: String| CliError::input_error(line, e)),
        Some(other) => Err(CliError::input_error(
            line,
            format!("{} must be a string, got {}", STATUS_KEY, other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DDL: &str = "CREATE TABLE customer (
        id INTEGER NOT NULL,
        name TEXT,
        version INTEGER NOT NULL,
        dateFrom TEXT,
        dateTo TEXT
    );";

    fn config() -> Config {
        Config::parse(
            &json!({
                "database": ":memory:",
                "init_sql": DDL,
                "log_level": "error",
                "versioning": {
                    "table": "customer",
                    "fields": [
                        {"name": "id", "kind": "id", "type": "integer"},
                        {"name": "name", "kind": "compare", "type": "string"}
                    ]
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn output_lines(out: Vec<u8>) -> Vec<JsonValue> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::parse(
            &json!({
                "database": "dim.db",
                "versioning": {
                    "table": "customer",
                    "fields": [{"name": "id", "kind": "id", "type": "integer"}]
                }
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(config.log_level, "info");
        assert!(config.init_sql.is_none());
        assert_eq!(config.versioning.commit_size, 100);
    }

    #[test]
    fn test_config_rejects_bad_log_level() {
        let mut config = config();
        config.log_level = "loud".into();
        let err = config.validate().unwrap_err();
        assert_eq!(err.code_str(), "VERSIONING_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_config_rejects_invalid_versioning() {
        let err = Config::parse(
            &json!({
                "database": "dim.db",
                "versioning": {"table": "customer", "fields": []}
            })
            .to_string(),
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "VERSIONING_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_sync_rows_writes_results_and_metrics() {
        let input = Cursor::new(
            "{\"id\": 1, \"name\": \"a\"}\n{\"id\": 2, \"name\": \"b\", \"_status\": \"identical\"}\n",
        );
        let mut out = Vec::new();
        sync_rows(&config(), input, &mut out).unwrap();

        let lines = output_lines(out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["status"], "new");
        assert_eq!(lines[0]["version"], 1);
        assert_eq!(lines[1]["status"], "skipped");
        assert_eq!(lines[2]["metrics"]["lines_input"], 2);
    }

    #[test]
    fn test_sync_rows_rejects_unknown_status() {
        let input = Cursor::new("{\"id\": 1, \"_status\": \"sideways\"}\n");
        let err = sync_rows(&config(), input, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code_str(), "VERSIONING_CLI_INPUT_ERROR");
    }

    #[test]
    fn test_take_status() {
        let mut json = json!({"id": 1, "_status": "purged"});
        assert_eq!(take_status(1, &mut json).unwrap(), Some(RowStatus::Purged));
        assert!(json.get(STATUS_KEY).is_none());

        let mut json = json!({"id": 1});
        assert_eq!(take_status(1, &mut json).unwrap(), None);

        assert!(take_status(1, &mut json!([1])).is_err());
    }
}
