use std::ops::Bound;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::data_store::record::{Record, RowKey};
use crate::errors::Result;
use crate::mutation::condition::{ConditionalMutation, MutationStatus};

/// A forward row range over a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    pub start: Bound<RowKey>,
    pub end: Bound<RowKey>,
}

impl ScanRange {
    /// Every row in the store.
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Rows from `start` (inclusive) to `end` (inclusive).
    pub fn closed(start: impl Into<RowKey>, end: impl Into<RowKey>) -> Self {
        Self {
            start: Bound::Included(start.into()),
            end: Bound::Included(end.into()),
        }
    }

    /// Returns `true` if `row` is past the end of this range.
    pub fn is_past_end(&self, row: &str) -> bool {
        match &self.end {
            Bound::Unbounded => false,
            Bound::Included(end) => row > end.as_str(),
            Bound::Excluded(end) => row >= end.as_str(),
        }
    }

    /// Returns `true` if `row` is before the start of this range.
    pub fn is_before_start(&self, row: &str) -> bool {
        match &self.start {
            Bound::Unbounded => false,
            Bound::Included(start) => row < start.as_str(),
            Bound::Excluded(start) => row <= start.as_str(),
        }
    }
}

/// Iterator over scanned records, in ascending row order.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<Record>> + 'a>;

/// Trait for the key-addressed store that holds FATE and tablet records.
///
/// The only atomicity a store has to provide is per row: a conditional
/// mutation is checked and applied as one step with respect to every other
/// mutation on the same row. Nothing is promised across rows.
///
/// Implementations must be `Send` and `Sync` so that many workers can share
/// one store.
pub trait RecordStore: Send + Sync {
    /// Checks the mutation's conditions against the current row and, if they
    /// all hold, applies its writes.
    ///
    /// Returns `Ok(MutationStatus::Unknown)` when the store cannot tell
    /// whether the mutation was applied. `Err` is reserved for failures where
    /// the mutation certainly was not attempted.
    fn submit(&self, mutation: ConditionalMutation) -> Result<MutationStatus>;

    /// Submits a mutation without waiting for its outcome.
    ///
    /// The default runs [`RecordStore::submit`] right away and hands back an
    /// already completed future. Stores with a real asynchronous write path
    /// override this.
    fn submit_async(&self, mutation: ConditionalMutation) -> BoxFuture<'static, Result<MutationStatus>> {
        futures::future::ready(self.submit(mutation)).boxed()
    }

    /// Reads the current state of a single row.
    fn read(&self, row: &str) -> Result<Option<Record>>;

    /// Scans the rows in `range` in ascending row order.
    fn scan(&self, range: &ScanRange) -> Result<RecordIter<'_>>;
}
