//! Status to storage mutation dispatch

use crate::compare::RowStatus;
use crate::storage::{StorageResult, VersionStorage};
use crate::value::Row;

/// The storage write a row status calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationRequest {
    /// Nothing to write
    NoOp,
    UpdateLastSeen,
    InsertVersion,
    ChangedVersion,
    UpdateVersion,
    PurgeOne,
}

impl MutationRequest {
    /// Decide the mutation for `status`.
    ///
    /// `identical` only writes when lastSeen is tracked.
    pub fn for_status(status: RowStatus, tracks_last_seen: bool) -> Self {
        match status {
            RowStatus::Identical if tracks_last_seen => MutationRequest::UpdateLastSeen,
            RowStatus::Identical => MutationRequest::NoOp,
            RowStatus::New | RowStatus::Outdated => MutationRequest::InsertVersion,
            RowStatus::Changed => MutationRequest::ChangedVersion,
            RowStatus::Update => MutationRequest::UpdateVersion,
            RowStatus::Purged => MutationRequest::PurgeOne,
            RowStatus::Skipped => MutationRequest::NoOp,
        }
    }

    /// True if the row must be kept until its transaction commits
    pub fn writes(&self) -> bool {
        !matches!(self, MutationRequest::NoOp)
    }

    /// Run the mutation against storage.
    pub fn apply(&self, storage: &mut VersionStorage, row: &Row) -> StorageResult<()> {
        match self {
            MutationRequest::NoOp => Ok(()),
            MutationRequest::UpdateLastSeen => storage.update_last_seen(row),
            MutationRequest::InsertVersion => storage.insert_version(row),
            MutationRequest::ChangedVersion => storage.changed_version(row),
            MutationRequest::UpdateVersion => storage.update_version(row),
            MutationRequest::PurgeOne => storage.purge_one(row),
        }
    }
}
