use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_skiplist::SkipMap;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::data_store::record::{Record, RowKey};
use crate::errors::Result;
use crate::mutation::condition::{ConditionalMutation, MutationStatus};
use crate::storage::{RecordIter, RecordStore, ScanRange};

/// A failure to simulate on an upcoming conditional mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// Apply the mutation normally, then report `Unknown`.
    ApplyThenUnknown,
    /// Drop the mutation without evaluating it and report `Unknown`.
    DropThenUnknown,
}

/// An in-memory record store backed by a lock-free `SkipMap`.
///
/// Reads and scans never block. Conditional mutations are serialized by a
/// single writer lock so that the check and the write of a mutation happen
/// as one step with respect to every other mutation.
pub struct MemRecordStore {
    rows: SkipMap<RowKey, Record>,
    write_lock: Mutex<()>,
    faults: Mutex<VecDeque<InjectedFault>>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl Default for MemRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemRecordStore {
    /// Creates a new, empty `MemRecordStore`.
    pub fn new() -> Self {
        Self {
            rows: SkipMap::new(),
            write_lock: Mutex::new(()),
            faults: Mutex::new(VecDeque::new()),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Queues a fault that the next conditional mutation will hit.
    /// Faults are consumed in the order they were queued.
    pub fn inject_fault(&self, fault: InjectedFault) {
        self.faults.lock().push_back(fault);
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of mutations accepted and rejected since creation.
    pub fn outcome_counts(&self) -> (u64, u64) {
        (
            self.accepted.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }

    fn apply_locked(&self, mutation: &ConditionalMutation) -> MutationStatus {
        let current = self.rows.get(mutation.row()).map(|e| e.value().clone());
        if !mutation.conditions_hold(current.as_ref()) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return MutationStatus::Rejected;
        }
        match mutation.apply_to(current) {
            Some(record) => {
                self.rows.insert(mutation.row().to_string(), record);
            }
            None => {
                self.rows.remove(mutation.row());
            }
        }
        self.accepted.fetch_add(1, Ordering::Relaxed);
        MutationStatus::Accepted
    }
}

impl RecordStore for MemRecordStore {
    fn submit(&self, mutation: ConditionalMutation) -> Result<MutationStatus> {
        let _guard = self.write_lock.lock();
        let fault = self.faults.lock().pop_front();
        let status = match fault {
            None => self.apply_locked(&mutation),
            Some(InjectedFault::ApplyThenUnknown) => {
                let applied = self.apply_locked(&mutation);
                debug!(
                    "injected fault on row {}: hid outcome {}",
                    mutation.row(),
                    applied
                );
                MutationStatus::Unknown
            }
            Some(InjectedFault::DropThenUnknown) => {
                debug!("injected fault on row {}: dropped mutation", mutation.row());
                MutationStatus::Unknown
            }
        };
        trace!("mutation on row {} -> {}", mutation.row(), status);
        Ok(status)
    }

    fn read(&self, row: &str) -> Result<Option<Record>> {
        Ok(self.rows.get(row).map(|e| e.value().clone()))
    }

    fn scan(&self, range: &ScanRange) -> Result<RecordIter<'_>> {
        let bounds = (range.start.clone(), range.end.clone());
        let iter = self
            .rows
            .range::<RowKey, _>(bounds)
            .map(|entry| Ok(entry.value().clone()));
        Ok(Box::new(iter))
    }
}
