//! Versioning options
//!
//! Options describe one versioned table: where it lives, how its fields are
//! classified, what the bookkeeping columns are called, and how a session
//! batches and purges.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{Result, VersioningError};
use crate::fields::{FieldClassification, FieldNames};
use crate::storage::{IdentifierQuote, TableLayout, DEFAULT_COMMIT_SIZE};
use crate::value::truncate_to_micros;

/// Upper bound written to the validTo column of new versions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityHorizon {
    /// Session start plus 100 years
    #[default]
    FarFuture,
    /// Null, an open-ended interval
    Open,
    /// A fixed instant after session start
    At(DateTime<Utc>),
}

impl ValidityHorizon {
    /// Resolve the horizon for a session starting at `start`.
    pub fn resolve(&self, start: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        match self {
            ValidityHorizon::FarFuture => start
                .checked_add_months(Months::new(100 * 12))
                .map(Some)
                .ok_or_else(|| VersioningError::Config("validity horizon overflows".into())),
            ValidityHorizon::Open => Ok(None),
            ValidityHorizon::At(at) => {
                if *at <= start {
                    return Err(VersioningError::Config(format!(
                        "valid_to {} is not after session start {}",
                        at, start
                    )));
                }
                Ok(Some(truncate_to_micros(*at)))
            }
        }
    }
}

/// Options of a versioning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersioningOptions {
    /// Table name
    pub table: String,

    /// Schema qualifying the table, if any
    #[serde(default)]
    pub schema: Option<String>,

    /// Identifier quoting style (default: double quotes)
    #[serde(default)]
    pub quote: IdentifierQuote,

    /// Writes per transaction (default: 100)
    #[serde(default = "default_commit_size")]
    pub commit_size: usize,

    /// Close versions not seen during the session on `finish`
    #[serde(default)]
    pub purge: bool,

    /// Extra SQL predicate narrowing the purge
    #[serde(default)]
    pub purge_where: Option<String>,

    /// Session start (default: when the session opens)
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    /// validTo of new versions (default: far future)
    #[serde(default)]
    pub valid_to: ValidityHorizon,

    /// Bookkeeping column names
    #[serde(default)]
    pub field_names: FieldNames,

    /// Field classification, in column order
    pub fields: FieldClassification,
}

fn default_commit_size() -> usize {
    DEFAULT_COMMIT_SIZE
}

impl VersioningOptions {
    pub fn new(table: impl Into<String>, fields: FieldClassification) -> Self {
        Self {
            table: table.into(),
            schema: None,
            quote: IdentifierQuote::default(),
            commit_size: default_commit_size(),
            purge: false,
            purge_where: None,
            start_date: None,
            valid_to: ValidityHorizon::default(),
            field_names: FieldNames::default(),
            fields,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_quote(mut self, quote: IdentifierQuote) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_commit_size(mut self, commit_size: usize) -> Self {
        self.commit_size = commit_size;
        self
    }

    /// Enable purging, optionally narrowed by a predicate.
    pub fn with_purge(mut self, purge_where: Option<String>) -> Self {
        self.purge = true;
        self.purge_where = purge_where;
        self
    }

    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_valid_to(mut self, valid_to: ValidityHorizon) -> Self {
        self.valid_to = valid_to;
        self
    }

    pub fn with_field_names(mut self, field_names: FieldNames) -> Self {
        self.field_names = field_names;
        self
    }

    /// Check the options for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(VersioningError::Config("table name is empty".into()));
        }
        if self.commit_size == 0 {
            return Err(VersioningError::Config(
                "commit_size must be greater than zero".into(),
            ));
        }
        self.fields.validate(&self.field_names)?;
        if self.purge && !self.field_names.tracks_last_seen() {
            return Err(VersioningError::Config(
                "purge requires field_names.last_seen".into(),
            ));
        }
        if let Some(start) = self.start_date {
            self.valid_to.resolve(start)?;
        }
        Ok(())
    }

    /// Physical layout handed to storage
    pub fn layout(&self) -> TableLayout {
        TableLayout {
            schema: self.schema.clone(),
            table: self.table.clone(),
            quote: self.quote,
            fields: self.fields.clone(),
            names: self.field_names.clone(),
        }
    }
}
