//! Column layout of a FATE transaction record and a typed view over it.
//!
//! Every transaction is one row keyed by its canonical [`FateId`]. Each
//! logical field lives in its own column so that it can be conditioned on
//! and written independently of the others.

use log::warn;
use serde::de::DeserializeOwned;

use crate::data_store::record::{Column, Record};
use crate::errors::{MoiraError, Result};
use crate::fate::id::FateId;
use crate::fate::reservation::FateReservation;
use crate::fate::status::TStatus;

pub const TX_FAMILY: &str = "tx";
pub const TX_INFO_FAMILY: &str = "txinfo";
pub const REPO_FAMILY: &str = "repo";

pub fn status_column() -> Column {
    Column::new(TX_FAMILY, "status")
}

pub fn reservation_column() -> Column {
    Column::new(TX_FAMILY, "reservation")
}

pub fn create_time_column() -> Column {
    Column::new(TX_FAMILY, "create_time")
}

/// Auxiliary, write-once-in-practice details about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxInfo {
    Name,
    AutoClean,
    Exception,
    ReturnValue,
}

impl TxInfo {
    pub fn column(&self) -> Column {
        let qualifier = match self {
            TxInfo::Name => "name",
            TxInfo::AutoClean => "auto_clean",
            TxInfo::Exception => "exception",
            TxInfo::ReturnValue => "return_value",
        };
        Column::new(TX_INFO_FAMILY, qualifier)
    }
}

/// Column for the step at `position`.
///
/// Qualifiers are inverted so that a forward scan of the repo family sees
/// the highest position, the top of the stack, first.
pub fn repo_column(position: u32) -> Column {
    Column::new(REPO_FAMILY, format!("{:08x}", u32::MAX - position))
}

fn repo_position(qualifier: &str) -> Result<u32> {
    u32::from_str_radix(qualifier, 16)
        .map(|inverted| u32::MAX - inverted)
        .map_err(|_| MoiraError::Other(format!("bad repo qualifier {qualifier}")))
}

/// Typed view of a transaction record as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FateRecord {
    pub fate_id: FateId,
    pub status: Option<TStatus>,
    pub reservation: Option<FateReservation>,
    pub create_time_millis: Option<u64>,
    pub name: Option<String>,
    pub auto_clean: Option<bool>,
    pub exception: Option<String>,
    pub return_value: Option<String>,
    /// Steps keyed by position, top of stack first.
    pub repos: Vec<(u32, Vec<u8>)>,
}

impl FateRecord {
    pub fn from_record(record: &Record) -> Result<Self> {
        let fate_id: FateId = record.row().parse()?;
        let status = record.get_str(&status_column()).map(|s| {
            s.parse().unwrap_or_else(|_| {
                warn!("{} has unrecognized status {}", fate_id, s);
                TStatus::Unknown
            })
        });
        let reservation = record
            .get_str(&reservation_column())
            .map(str::parse)
            .transpose()?;
        let create_time_millis = record
            .get_str(&create_time_column())
            .and_then(|s| s.parse().ok());
        let info = |info: TxInfo| record.get_str(&info.column()).map(str::to_string);

        let mut repos = Vec::new();
        for (column, value) in record.family(REPO_FAMILY) {
            repos.push((repo_position(&column.qualifier)?, value.to_vec()));
        }

        Ok(Self {
            fate_id,
            status,
            reservation,
            create_time_millis,
            name: info(TxInfo::Name),
            auto_clean: info(TxInfo::AutoClean).map(|v| v == "true"),
            exception: info(TxInfo::Exception),
            return_value: info(TxInfo::ReturnValue),
            repos,
        })
    }

    /// Position of the step on top of the stack.
    pub fn top_position(&self) -> Option<u32> {
        self.repos.first().map(|(pos, _)| *pos)
    }

    /// Decodes the step at `position`.
    pub fn repo<R: DeserializeOwned>(&self, position: u32) -> Result<Option<R>> {
        self.repos
            .iter()
            .find(|(pos, _)| *pos == position)
            .map(|(_, bytes)| bincode::deserialize(bytes).map_err(MoiraError::from))
            .transpose()
    }

    /// Decodes the step on top of the stack.
    pub fn top<R: DeserializeOwned>(&self) -> Result<Option<R>> {
        match self.top_position() {
            Some(pos) => self.repo(pos),
            None => Ok(None),
        }
    }
}
