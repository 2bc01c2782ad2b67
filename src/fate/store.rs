use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::{MoiraError, Result};
use crate::fate::id::{FateId, FateInstanceType};
use crate::fate::mutator::FateMutator;
use crate::fate::reservation::{FateReservation, LockId};
use crate::fate::schema::{FateRecord, TxInfo};
use crate::fate::status::TStatus;
use crate::mutation::condition::MutationStatus;
use crate::storage::{RecordStore, ScanRange};

/// Transaction-level operations over FATE records kept in a [`RecordStore`].
///
/// Everything here is built from [`FateMutator`] calls. Operations that change
/// a transaction go through a [`FateTxStore`], which only exists while its
/// holder owns the reservation, and every mutation it sends requires that
/// reservation explicitly.
pub struct FateStore {
    store: Arc<dyn RecordStore>,
    max_repos: u32,
}

impl FateStore {
    pub fn new(store: Arc<dyn RecordStore>, max_repos: u32) -> Self {
        Self { store, max_repos }
    }

    pub fn mutator(&self, fate_id: FateId) -> FateMutator {
        FateMutator::new(Arc::clone(&self.store), fate_id)
    }

    /// Creates a new transaction in status `NEW`.
    pub fn create(&self, instance_type: FateInstanceType) -> Result<FateId> {
        let fate_id = FateId::random(instance_type);
        let status = self
            .mutator(fate_id)
            .require_absent()
            .put_status(TStatus::New)
            .put_create_time(now_millis()?)
            .try_mutate_verified(|r| r.is_some_and(|r| r.status == Some(TStatus::New)))?;
        match status {
            MutationStatus::Accepted => {
                debug!("created {}", fate_id);
                Ok(fate_id)
            }
            status => Err(MoiraError::IllegalState(format!(
                "failed to create {fate_id}: {status}"
            ))),
        }
    }

    pub fn read(&self, fate_id: FateId) -> Result<Option<FateRecord>> {
        self.store
            .read(&fate_id.canonical())?
            .map(|r| FateRecord::from_record(&r))
            .transpose()
    }

    /// Reads every transaction in the store.
    pub fn list(&self) -> Result<Vec<FateRecord>> {
        let mut records = Vec::new();
        for record in self.store.scan(&ScanRange::all())? {
            records.push(FateRecord::from_record(&record?)?);
        }
        Ok(records)
    }

    /// Tries to reserve `fate_id` for `lock_id`.
    ///
    /// Returns `None` if someone else holds the reservation or the
    /// transaction does not exist.
    pub fn try_reserve(&self, fate_id: FateId, lock_id: &LockId) -> Result<Option<FateTxStore<'_>>> {
        let reservation = FateReservation::new(lock_id.clone());
        let expected = reservation.clone();
        let status = self
            .mutator(fate_id)
            .require_status(&TStatus::ALL)
            .put_reserved_tx(&reservation)
            .try_mutate_verified(|r| r.is_some_and(|r| r.reservation.as_ref() == Some(&expected)))?;
        match status {
            MutationStatus::Accepted => {
                debug!("{} reserved by {}", fate_id, reservation);
                Ok(Some(FateTxStore {
                    fate: self,
                    fate_id,
                    reservation,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Releases reservations held by locks that `is_live` reports as gone.
    ///
    /// Each release requires the exact dead reservation, so a transaction
    /// reserved again in the meantime is left alone. Returns how many
    /// reservations were released.
    pub fn delete_dead_reservations<F>(&self, is_live: F) -> Result<usize>
    where
        F: Fn(&LockId) -> bool,
    {
        let mut released = 0;
        for record in self.list()? {
            let Some(reservation) = record.reservation else {
                continue;
            };
            if is_live(reservation.lock_id()) {
                continue;
            }
            let status = self
                .mutator(record.fate_id)
                .put_unreserve_tx(&reservation)
                .try_mutate()?;
            if status == MutationStatus::Accepted {
                info!("released dead reservation {} on {}", reservation, record.fate_id);
                released += 1;
            } else {
                debug!("dead reservation {} on {} -> {}", reservation, record.fate_id, status);
            }
        }
        Ok(released)
    }
}

/// A reserved transaction.
pub struct FateTxStore<'a> {
    fate: &'a FateStore,
    fate_id: FateId,
    reservation: FateReservation,
}

impl FateTxStore<'_> {
    pub fn fate_id(&self) -> FateId {
        self.fate_id
    }

    pub fn reservation(&self) -> &FateReservation {
        &self.reservation
    }

    fn reserved_mutator(&self) -> FateMutator {
        self.fate.mutator(self.fate_id).require_reserved(&self.reservation)
    }

    fn read(&self) -> Result<FateRecord> {
        self.fate
            .read(self.fate_id)?
            .ok_or_else(|| MoiraError::IllegalState(format!("{} does not exist", self.fate_id)))
    }

    fn expect_accepted(&self, what: &str, status: MutationStatus) -> Result<()> {
        match status {
            MutationStatus::Accepted => Ok(()),
            status => Err(MoiraError::IllegalState(format!(
                "{}: {} was {}",
                self.fate_id, what, status
            ))),
        }
    }

    pub fn status(&self) -> Result<Option<TStatus>> {
        Ok(self.read()?.status)
    }

    /// Decodes the step on top of the stack.
    pub fn top<R: DeserializeOwned>(&self) -> Result<Option<R>> {
        self.read()?.top()
    }

    /// Pushes `repo` on top of the stack. Allowed in `NEW` and `IN_PROGRESS`.
    pub fn push<R: Serialize>(&self, repo: &R) -> Result<()> {
        let record = self.read()?;
        if record.repos.len() >= self.fate.max_repos as usize {
            return Err(MoiraError::StackOverflow {
                fate_id: self.fate_id.canonical(),
                max: self.fate.max_repos,
            });
        }
        let position = match record.top_position() {
            None => 1,
            Some(top) => top.checked_add(1).ok_or_else(|| MoiraError::StackOverflow {
                fate_id: self.fate_id.canonical(),
                max: self.fate.max_repos,
            })?,
        };
        let status = self
            .reserved_mutator()
            .require_status(&[TStatus::New, TStatus::InProgress])
            .put_repo(position, repo)?
            .try_mutate_verified(|r| {
                r.is_some_and(|r| r.repos.iter().any(|(pos, _)| *pos == position))
            })?;
        self.expect_accepted(&format!("push at position {position}"), status)
    }

    /// Removes the step on top of the stack. Allowed in
    /// `FAILED_IN_PROGRESS` and `SUCCESSFUL`.
    pub fn pop(&self) -> Result<()> {
        let Some(position) = self.read()?.top_position() else {
            return Err(MoiraError::IllegalState(format!(
                "{}: nothing to pop",
                self.fate_id
            )));
        };
        let status = self
            .reserved_mutator()
            .require_status(&[TStatus::FailedInProgress, TStatus::Successful])
            .delete_repo(position)
            .try_mutate_verified(|r| {
                r.is_some_and(|r| r.repos.iter().all(|(pos, _)| *pos != position))
            })?;
        self.expect_accepted(&format!("pop at position {position}"), status)
    }

    pub fn set_status(&self, status: TStatus) -> Result<()> {
        let outcome = self
            .reserved_mutator()
            .put_status(status)
            .try_mutate_verified(|r| r.is_some_and(|r| r.status == Some(status)))?;
        self.expect_accepted(&format!("set status {status}"), outcome)
    }

    pub fn set_tx_info(&self, info: TxInfo, value: &str) -> Result<()> {
        let status = self.reserved_mutator().put_tx_info(info, value).try_mutate()?;
        self.expect_accepted(&format!("set {:?}", info), status)
    }

    /// Deletes the transaction. Allowed in `NEW`, `SUBMITTED`, `SUCCESSFUL`
    /// and `FAILED`. The reservation goes away with the record.
    pub fn delete(self) -> Result<()> {
        let status = self
            .reserved_mutator()
            .require_status(&[
                TStatus::New,
                TStatus::Submitted,
                TStatus::Successful,
                TStatus::Failed,
            ])
            .delete()
            .try_mutate_verified(|r| r.is_none())?;
        self.expect_accepted("delete", status)
    }

    /// Releases the reservation.
    pub fn unreserve(self) -> Result<()> {
        let held = &self.reservation;
        let status = self
            .fate
            .mutator(self.fate_id)
            .put_unreserve_tx(held)
            .try_mutate_verified(|r| r.is_none_or(|r| r.reservation.as_ref() != Some(held)))?;
        if status != MutationStatus::Accepted {
            warn!("{}: releasing {} was {}", self.fate_id, self.reservation, status);
        }
        self.expect_accepted("unreserve", status)
    }
}

fn now_millis() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| MoiraError::Other(e.to_string()))
}
