//! Transaction batching
//!
//! - Writes accumulate in one open transaction
//! - The batch commits once `commit_size` writes are pending
//! - Rows processed since the last commit are kept as a backup and handed
//!   to the recovery callback if the batch is rolled back
//!
//! A batch never splits a logical unit: callers record one write per
//! processed row, after every statement of that row has run.

/// Default number of writes per transaction
pub const DEFAULT_COMMIT_SIZE: usize = 100;

/// Pending writes and backup rows of the open transaction.
#[derive(Debug)]
pub struct TransactionBatch<R> {
    commit_size: usize,
    pending_writes: usize,
    backup_rows: Vec<R>,
}

impl<R> TransactionBatch<R> {
    /// Create a batch committing every `commit_size` writes.
    ///
    /// A size of zero is treated as one.
    pub fn new(commit_size: usize) -> Self {
        Self {
            commit_size: commit_size.max(1),
            pending_writes: 0,
            backup_rows: Vec::new(),
        }
    }

    pub fn commit_size(&self) -> usize {
        self.commit_size
    }

    /// Writes since the last commit or rollback
    pub fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    /// Rows processed since the last commit or rollback
    pub fn backup_rows(&self) -> &[R] {
        &self.backup_rows
    }

    /// Remember a row until its transaction ends.
    pub fn add_backup(&mut self, row: R) {
        self.backup_rows.push(row);
    }

    /// Count one write. Returns true when the batch should commit.
    pub fn record_write(&mut self) -> bool {
        self.pending_writes += 1;
        self.pending_writes >= self.commit_size
    }

    pub fn is_empty(&self) -> bool {
        self.pending_writes == 0 && self.backup_rows.is_empty()
    }

    /// Reset after commit.
    pub fn clear(&mut self) {
        self.pending_writes = 0;
        self.backup_rows.clear();
    }

    /// Reset after rollback, returning the rows that were not committed.
    pub fn take_backup_rows(&mut self) -> Vec<R> {
        self.pending_writes = 0;
        std::mem::take(&mut self.backup_rows)
    }
}

impl<R> Default for TransactionBatch<R> {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_SIZE)
    }
}
