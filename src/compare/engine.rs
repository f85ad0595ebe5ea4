//! Status decision against stored state

use chrono::{DateTime, Utc};

use super::comparator::ValueComparator;
use super::errors::CompareResult;
use super::outcome::{CompareOutcome, RowStatus};
use crate::fields::{FieldClassification, FieldKind};
use crate::storage::{VersionStorage, VersionedRecord};
use crate::value::Row;

/// Decides the status and target version of incoming rows
#[derive(Debug, Clone)]
pub struct CompareEngine {
    fields: FieldClassification,
}

impl CompareEngine {
    pub fn new(fields: FieldClassification) -> Self {
        Self { fields }
    }

    /// Classify `row` against the versions stored for its identifier.
    ///
    /// 1. Active version at `now`: changed, update or identical
    /// 2. Otherwise latest version of any validity: outdated
    /// 3. Otherwise: new, version 1
    pub fn compare(
        &self,
        storage: &mut VersionStorage,
        row: &Row,
        now: DateTime<Utc>,
    ) -> CompareResult<CompareOutcome> {
        if let Some(active) = storage.get_active_version(row, now)? {
            return self.against_active(row, &active);
        }
        match storage.get_version(row)? {
            Some(latest) => Ok(CompareOutcome::new(RowStatus::Outdated, latest.version() + 1)),
            None => Ok(CompareOutcome::new(RowStatus::New, 1)),
        }
    }

    /// Classify `row` against its active version.
    pub fn against_active(
        &self,
        row: &Row,
        active: &VersionedRecord,
    ) -> CompareResult<CompareOutcome> {
        let version = active.version();
        if self.any_differs(FieldKind::Compare, row, active.row())? {
            return Ok(CompareOutcome::new(RowStatus::Changed, version + 1));
        }
        if self.any_differs(FieldKind::Update, row, active.row())? {
            return Ok(CompareOutcome::new(RowStatus::Update, version));
        }
        Ok(CompareOutcome::new(RowStatus::Identical, version))
    }

    fn any_differs(&self, kind: FieldKind, row: &Row, stored: &Row) -> CompareResult<bool> {
        for descriptor in self.fields.descriptors(kind) {
            if !ValueComparator::field_equal(descriptor, row, stored)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
