//! Stored versions

use chrono::{DateTime, Utc};

use super::errors::{StorageError, StorageResult};
use crate::fields::FieldNames;
use crate::value::{Row, Value};

/// A version row read back from the table.
///
/// The version number is required. Validity bounds are parsed when
/// present; a null `valid_to` means the interval is open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    row: Row,
    version: i64,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
}

impl VersionedRecord {
    pub fn from_row(row: Row, names: &FieldNames) -> StorageResult<Self> {
        let version = match row.value(&names.version) {
            Value::Int32(v) => i64::from(*v),
            Value::Int64(v) => *v,
            Value::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                StorageError::invalid_data(format!(
                    "{} is not an integer: {:?}",
                    names.version, text
                ))
            })?,
            other => {
                return Err(StorageError::invalid_data(format!(
                    "{} is not an integer: {}",
                    names.version,
                    other.type_name()
                )))
            }
        };
        let valid_from = timestamp_column(&row, &names.valid_from)?;
        let valid_to = timestamp_column(&row, &names.valid_to)?;
        Ok(Self {
            row,
            version,
            valid_from,
            valid_to,
        })
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn into_row(self) -> Row {
        self.row
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn valid_from(&self) -> Option<DateTime<Utc>> {
        self.valid_from
    }

    pub fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }

    /// True if the interval has no upper bound
    pub fn is_open_ended(&self) -> bool {
        self.valid_to.is_none()
    }
}

fn timestamp_column(row: &Row, name: &str) -> StorageResult<Option<DateTime<Utc>>> {
    let value = row.value(name);
    if value.is_null() {
        return Ok(None);
    }
    value.as_timestamp().map(Some).ok_or_else(|| {
        StorageError::invalid_data(format!("{} is not a timestamp: {:?}", name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_stored_row() {
        let row = Row::new()
            .with("id", 1i64)
            .with("version", 3i64)
            .with("dateFrom", "2024-01-01 10:00:00.000001")
            .with("dateTo", Value::Null);
        let record = VersionedRecord::from_row(row, &FieldNames::default()).unwrap();
        assert_eq!(record.version(), 3);
        assert!(record.is_open_ended());
        assert_eq!(
            record.valid_from().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
                + chrono::Duration::microseconds(1)
        );
    }

    #[test]
    fn test_version_as_text() {
        let row = Row::new().with("version", "7");
        let record = VersionedRecord::from_row(row, &FieldNames::default()).unwrap();
        assert_eq!(record.version(), 7);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let row = Row::new().with("version", 1.5f64);
        let err = VersionedRecord::from_row(row, &FieldNames::default()).unwrap_err();
        assert!(err.is_fatal());

        let missing = VersionedRecord::from_row(Row::new(), &FieldNames::default());
        assert!(missing.is_err());
    }

    #[test]
    fn test_invalid_timestamp_is_rejected() {
        let row = Row::new().with("version", 1i64).with("dateFrom", "yesterday");
        assert!(VersionedRecord::from_row(row, &FieldNames::default()).is_err());
    }
}
