//! Per-row results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::compare::RowStatus;
use crate::value::{format_timestamp, Row};

/// Why a forced status was downgraded to `skipped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Nothing is stored for the identifier
    NotStored,
    /// Versions exist, none of them active
    Outdated,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotStored => "not_stored",
            SkipReason::Outdated => "outdated",
        }
    }

    /// Reason a forced status cannot apply to `natural`, if any
    pub fn for_natural_status(natural: RowStatus) -> Option<Self> {
        match natural {
            RowStatus::New => Some(SkipReason::NotStored),
            RowStatus::Outdated => Some(SkipReason::Outdated),
            _ => None,
        }
    }
}

/// Outcome of processing one row
#[derive(Debug, Clone, PartialEq)]
pub struct VersioningResult {
    /// The row as written, bookkeeping columns included
    pub row: Row,
    pub version: i64,
    /// Instant the row was processed at. Only `new`, `outdated`, `changed`
    /// and `update` write it; for `identical`, `purged` and `skipped` the
    /// stored version keeps its own validFrom.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub status: RowStatus,
    pub skip_reason: Option<SkipReason>,
}

impl VersioningResult {
    /// JSON rendering used by the command line
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "status": self.status.as_str(),
            "version": self.version,
            "valid_from": self.valid_from.as_ref().map(format_timestamp),
            "valid_to": self.valid_to.as_ref().map(format_timestamp),
            "skip_reason": self.skip_reason.map(|r| r.as_str()),
            "row": self.row.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_skip_reason_for_natural_status() {
        assert_eq!(
            SkipReason::for_natural_status(RowStatus::New),
            Some(SkipReason::NotStored)
        );
        assert_eq!(
            SkipReason::for_natural_status(RowStatus::Outdated),
            Some(SkipReason::Outdated)
        );
        assert_eq!(SkipReason::for_natural_status(RowStatus::Changed), None);
        assert_eq!(SkipReason::for_natural_status(RowStatus::Identical), None);
    }

    #[test]
    fn test_result_json() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = VersioningResult {
            row: Row::new().with("id", 1i64),
            version: 1,
            valid_from: Some(from),
            valid_to: None,
            status: RowStatus::Skipped,
            skip_reason: Some(SkipReason::NotStored),
        };
        let json = result.to_json();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["skip_reason"], "not_stored");
        assert_eq!(json["valid_from"], "2024-01-01 00:00:00.000000");
        assert!(json["valid_to"].is_null());
        assert_eq!(json["row"]["id"], 1);
    }
}
