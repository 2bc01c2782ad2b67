use std::sync::Arc;

use log::{debug, trace};
use serde::Serialize;

use crate::data_store::record::Record;
use crate::errors::{MoiraError, Result};
use crate::fate::id::FateId;
use crate::fate::reservation::FateReservation;
use crate::fate::schema::{
    FateRecord, TxInfo, create_time_column, repo_column, reservation_column, status_column,
};
use crate::fate::status::TStatus;
use crate::mutation::condition::{Condition, MutationStatus};
use crate::mutation::mutator::ConditionalMutator;
use crate::storage::RecordStore;

/// Builds one conditional mutation of a FATE transaction record.
///
/// Every `require_*` call adds a condition and every `put_*`/`delete*` call
/// adds a write; all of them are sent together by [`FateMutator::try_mutate`]
/// or [`FateMutator::mutate`] and either all apply or none do.
///
/// Nothing is implied between columns. In particular a status change does not
/// check the reservation unless [`FateMutator::require_reserved`] is part of
/// the same mutation.
///
/// ```no_run
/// use std::sync::Arc;
/// use moira::prelude::*;
///
/// let store: Arc<dyn RecordStore> = Arc::new(MemRecordStore::new());
/// let fate_id = FateId::random(FateInstanceType::User);
///
/// // initialize a brand new transaction
/// FateMutator::new(Arc::clone(&store), fate_id)
///     .require_status(&[])
///     .put_status(TStatus::New)
///     .mutate()
///     .unwrap();
///
/// // move it forward only if nobody else did first
/// let status = FateMutator::new(store, fate_id)
///     .require_status(&[TStatus::New])
///     .put_status(TStatus::Submitted)
///     .try_mutate()
///     .unwrap();
/// assert_eq!(status, MutationStatus::Accepted);
/// ```
pub struct FateMutator {
    fate_id: FateId,
    inner: ConditionalMutator,
    ops: Vec<String>,
}

impl FateMutator {
    pub fn new(store: Arc<dyn RecordStore>, fate_id: FateId) -> Self {
        Self {
            fate_id,
            inner: ConditionalMutator::new(store, fate_id.canonical()),
            ops: Vec::new(),
        }
    }

    pub fn fate_id(&self) -> FateId {
        self.fate_id
    }

    fn with(mut self, op: String, f: impl FnOnce(ConditionalMutator) -> ConditionalMutator) -> Self {
        trace!("{} staging {}", self.fate_id, op);
        self.inner = f(self.inner);
        self.ops.push(op);
        self
    }

    /// Requires the current status to be one of `statuses`.
    ///
    /// With an empty slice the status column must be absent instead, which is
    /// how a caller states that the transaction was never initialized.
    pub fn require_status(self, statuses: &[TStatus]) -> Self {
        if statuses.is_empty() {
            return self.with("require status absent".into(), |m| {
                m.require(Condition::Absent(status_column()))
            });
        }
        let values = statuses.iter().map(|s| s.as_str().as_bytes().to_vec()).collect();
        self.with(format!("require status in {:?}", statuses), |m| {
            m.require(Condition::ValueIn {
                column: status_column(),
                values,
            })
        })
    }

    /// Requires that the record has no columns at all.
    pub fn require_absent(self) -> Self {
        self.with("require absent".into(), |m| m.require(Condition::RowAbsent))
    }

    pub fn require_unreserved(self) -> Self {
        self.with("require unreserved".into(), |m| {
            m.require(Condition::Absent(reservation_column()))
        })
    }

    /// Requires the record to be reserved with exactly `reservation`.
    pub fn require_reserved(self, reservation: &FateReservation) -> Self {
        let value = reservation.serialized();
        self.with(format!("require reserved by {value}"), |m| {
            m.require(Condition::equals(reservation_column(), value.into_bytes()))
        })
    }

    pub fn put_status(self, status: TStatus) -> Self {
        self.with(format!("put status {status}"), |m| {
            m.put(status_column(), status.as_str().as_bytes().to_vec())
        })
    }

    pub fn put_create_time(self, millis: u64) -> Self {
        self.with(format!("put create time {millis}"), |m| {
            m.put(create_time_column(), millis.to_string().into_bytes())
        })
    }

    pub fn put_name(self, name: &str) -> Self {
        self.put_tx_info(TxInfo::Name, name)
    }

    pub fn put_auto_clean(self, auto_clean: bool) -> Self {
        self.put_tx_info(TxInfo::AutoClean, if auto_clean { "true" } else { "false" })
    }

    pub fn put_exception(self, message: &str) -> Self {
        self.put_tx_info(TxInfo::Exception, message)
    }

    pub fn put_return_value(self, value: &str) -> Self {
        self.put_tx_info(TxInfo::ReturnValue, value)
    }

    pub fn put_tx_info(self, info: TxInfo, value: &str) -> Self {
        let value = value.as_bytes().to_vec();
        self.with(format!("put {:?}", info), |m| m.put(info.column(), value))
    }

    /// Writes `repo` at `position`, requiring that nothing was ever written
    /// there before. Steps are immutable once recorded.
    pub fn put_repo<R: Serialize>(self, position: u32, repo: &R) -> Result<Self> {
        let bytes = bincode::serialize(repo)?;
        Ok(self.with(format!("put repo at position {position} (must be absent)"), |m| {
            m.require(Condition::Absent(repo_column(position)))
                .put(repo_column(position), bytes)
        }))
    }

    pub fn delete_repo(self, position: u32) -> Self {
        self.with(format!("delete repo at position {position}"), |m| {
            m.delete(repo_column(position))
        })
    }

    /// Reserves the transaction, requiring that no reservation is present.
    ///
    /// Not idempotent: re-reserving with the reservation already held is
    /// rejected like any other attempt.
    pub fn put_reserved_tx(self, reservation: &FateReservation) -> Self {
        let value = reservation.serialized().into_bytes();
        self.with(format!("reserve with {reservation}"), |m| {
            m.require(Condition::Absent(reservation_column()))
                .put(reservation_column(), value)
        })
    }

    /// Releases `reservation`, requiring that it is exactly the one held.
    pub fn put_unreserve_tx(self, reservation: &FateReservation) -> Self {
        let value = reservation.serialized().into_bytes();
        self.with(format!("unreserve {reservation}"), |m| {
            m.require(Condition::equals(reservation_column(), value))
                .delete(reservation_column())
        })
    }

    /// Removes the whole record.
    pub fn delete(self) -> Self {
        self.with("delete".into(), |m| m.delete_row())
    }

    /// Applies the mutation and returns the store's outcome.
    pub fn try_mutate(self) -> Result<MutationStatus> {
        let status = self.inner.try_apply()?;
        debug!("{} {:?} -> {}", self.fate_id, self.ops, status);
        Ok(status)
    }

    /// Applies the mutation and resolves an `Unknown` outcome by reading the
    /// record back and asking `verifier` whether the write is visible.
    pub fn try_mutate_verified<F>(self, verifier: F) -> Result<MutationStatus>
    where
        F: FnOnce(Option<&FateRecord>) -> bool,
    {
        let fate_id = self.fate_id;
        let ops = self.ops;
        let status = self.inner.try_apply_verified(|record: Option<&Record>| {
            let parsed = record.and_then(|r| FateRecord::from_record(r).ok());
            verifier(parsed.as_ref())
        })?;
        debug!("{} {:?} -> {} (verified)", fate_id, ops, status);
        Ok(status)
    }

    /// Applies the mutation, failing with [`MoiraError::IllegalState`] unless
    /// it was accepted.
    ///
    /// Meant for callers where a rejection can only mean a bug, such as
    /// writing a step position twice.
    pub fn mutate(self) -> Result<()> {
        let fate_id = self.fate_id;
        let ops = self.ops.join(", ");
        match self.inner.try_apply()? {
            MutationStatus::Accepted => Ok(()),
            status => Err(MoiraError::IllegalState(format!(
                "{fate_id}: mutation [{ops}] was {status}"
            ))),
        }
    }
}
