//! Row statuses and compare outcomes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of an incoming row against stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// No version stored for the identifier
    New,
    /// Versions exist but none is active now
    Outdated,
    /// A compare field differs from the active version
    Changed,
    /// Only update fields differ from the active version
    Update,
    /// Nothing differs from the active version
    Identical,
    /// A forced status did not apply
    Skipped,
    /// The active version was closed
    Purged,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::New => "new",
            RowStatus::Outdated => "outdated",
            RowStatus::Changed => "changed",
            RowStatus::Update => "update",
            RowStatus::Identical => "identical",
            RowStatus::Skipped => "skipped",
            RowStatus::Purged => "purged",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(RowStatus::New),
            "outdated" => Ok(RowStatus::Outdated),
            "changed" => Ok(RowStatus::Changed),
            "update" => Ok(RowStatus::Update),
            "identical" => Ok(RowStatus::Identical),
            "skipped" => Ok(RowStatus::Skipped),
            "purged" => Ok(RowStatus::Purged),
            other => Err(format!("unknown row status: {}", other)),
        }
    }
}

/// Status of a row and the version number it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOutcome {
    pub status: RowStatus,
    pub version: i64,
}

impl CompareOutcome {
    pub fn new(status: RowStatus, version: i64) -> Self {
        Self { status, version }
    }

    /// Version of the stored active record, where one exists.
    ///
    /// A `changed` outcome points one past it.
    pub fn active_version(&self) -> i64 {
        match self.status {
            RowStatus::Changed => self.version - 1,
            _ => self.version,
        }
    }
}
