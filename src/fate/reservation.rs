use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{MoiraError, Result};

/// Identity of a worker's lock: the lock path, the lock node and an
/// ephemeral session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockId {
    path: String,
    node: String,
    eid: u64,
}

impl LockId {
    pub fn new(path: impl Into<String>, node: impl Into<String>, eid: u64) -> Self {
        Self {
            path: path.into(),
            node: node.into(),
            eid,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn eid(&self) -> u64 {
        self.eid
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}${:x}", self.path, self.node, self.eid)
    }
}

impl FromStr for LockId {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MoiraError::InvalidId(format!("not a lock id: {s}"));
        let (rest, eid) = s.rsplit_once('$').ok_or_else(invalid)?;
        let (path, node) = rest.rsplit_once('/').ok_or_else(invalid)?;
        let eid = u64::from_str_radix(eid, 16).map_err(|_| invalid())?;
        Ok(LockId::new(path, node, eid))
    }
}

/// The token a worker writes into a transaction record to own it.
///
/// Two reservations made by the same lock are still different: each one
/// carries its own random UUID, so a late release of an old reservation
/// cannot clear a newer one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FateReservation {
    lock_id: LockId,
    reservation_uuid: Uuid,
}

impl FateReservation {
    pub fn from(lock_id: LockId, reservation_uuid: Uuid) -> Self {
        Self {
            lock_id,
            reservation_uuid,
        }
    }

    /// Creates a fresh reservation for `lock_id`.
    pub fn new(lock_id: LockId) -> Self {
        Self::from(lock_id, Uuid::new_v4())
    }

    pub fn lock_id(&self) -> &LockId {
        &self.lock_id
    }

    pub fn reservation_uuid(&self) -> Uuid {
        self.reservation_uuid
    }

    /// The form stored in the reservation column.
    pub fn serialized(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FateReservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lock_id, self.reservation_uuid)
    }
}

impl FromStr for FateReservation {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        let (lock, uuid) = s
            .rsplit_once(':')
            .ok_or_else(|| MoiraError::InvalidId(format!("not a reservation: {s}")))?;
        let reservation_uuid =
            Uuid::parse_str(uuid).map_err(|e| MoiraError::InvalidId(format!("{s}: {e}")))?;
        Ok(FateReservation::from(lock.parse()?, reservation_uuid))
    }
}
