use std::fmt;
use std::ops::Bound;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data_store::record::{Column, Record};
use crate::errors::{MoiraError, Result};
use crate::fate::id::FateId;
use crate::mutation::condition::{Condition, MutationStatus};
use crate::mutation::mutator::ConditionalMutator;
use crate::storage::{RecordIter, RecordStore, ScanRange};
use crate::tablets::extent::{KeyExtent, TableId, first_metadata_row, metadata_row};

pub const TABLET_FAMILY: &str = "tablet";

pub fn prev_row_column() -> Column {
    Column::new(TABLET_FAMILY, "prev_row")
}

pub fn availability_column() -> Column {
    Column::new(TABLET_FAMILY, "availability")
}

pub fn operation_id_column() -> Column {
    Column::new(TABLET_FAMILY, "opid")
}

/// Prev end rows are stored with a presence byte so that "no prev row" and
/// "empty prev row" stay distinct.
pub(crate) fn encode_prev_row(prev: Option<&str>) -> Vec<u8> {
    match prev {
        Some(row) => {
            let mut v = Vec::with_capacity(row.len() + 1);
            v.push(1);
            v.extend_from_slice(row.as_bytes());
            v
        }
        None => vec![0],
    }
}

fn decode_prev_row(bytes: &[u8]) -> Result<Option<String>> {
    match bytes.split_first() {
        Some((0, _)) => Ok(None),
        Some((1, row)) => String::from_utf8(row.to_vec())
            .map(Some)
            .map_err(|e| MoiraError::Other(format!("bad prev row: {e}"))),
        _ => Err(MoiraError::Other("bad prev row encoding".into())),
    }
}

/// Whether, and how eagerly, a tablet should be hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabletAvailability {
    Hosted,
    Ondemand,
    Unhosted,
}

impl TabletAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabletAvailability::Hosted => "HOSTED",
            TabletAvailability::Ondemand => "ONDEMAND",
            TabletAvailability::Unhosted => "UNHOSTED",
        }
    }
}

impl fmt::Display for TabletAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabletAvailability {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HOSTED" => Ok(TabletAvailability::Hosted),
            "ONDEMAND" => Ok(TabletAvailability::Ondemand),
            "UNHOSTED" => Ok(TabletAvailability::Unhosted),
            other => Err(MoiraError::Other(format!("unknown tablet availability {other}"))),
        }
    }
}

/// Kinds of operations that claim a tablet exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabletOperationType {
    Splitting,
    Merging,
    Deleting,
}

impl TabletOperationType {
    fn as_str(&self) -> &'static str {
        match self {
            TabletOperationType::Splitting => "SPLITTING",
            TabletOperationType::Merging => "MERGING",
            TabletOperationType::Deleting => "DELETING",
        }
    }
}

/// The marker an operation writes into a tablet's metadata while it owns
/// the tablet: `<TYPE>:<FateId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabletOperationId {
    pub op_type: TabletOperationType,
    pub fate_id: FateId,
}

impl TabletOperationId {
    pub fn new(op_type: TabletOperationType, fate_id: FateId) -> Self {
        Self { op_type, fate_id }
    }
}

impl fmt::Display for TabletOperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.op_type.as_str(), self.fate_id)
    }
}

impl FromStr for TabletOperationId {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        let (ty, fate_id) = s
            .split_once(':')
            .ok_or_else(|| MoiraError::InvalidId(format!("not an operation id: {s}")))?;
        let op_type = match ty {
            "SPLITTING" => TabletOperationType::Splitting,
            "MERGING" => TabletOperationType::Merging,
            "DELETING" => TabletOperationType::Deleting,
            other => return Err(MoiraError::InvalidId(format!("unknown operation type {other}"))),
        };
        Ok(TabletOperationId::new(op_type, fate_id.parse()?))
    }
}

/// Typed view of one tablet's metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletMetadata {
    extent: KeyExtent,
    availability: Option<TabletAvailability>,
    operation_id: Option<TabletOperationId>,
}

impl TabletMetadata {
    pub fn from_record(record: &Record) -> Result<Self> {
        let (table_id, end_row) = KeyExtent::parse_metadata_row(record.row())?;
        let prev = record.get(&prev_row_column()).ok_or_else(|| {
            MoiraError::IllegalState(format!("tablet {} has no prev row", record.row()))
        })?;
        let extent = KeyExtent::new(table_id, end_row, decode_prev_row(prev)?);
        let availability = record
            .get_str(&availability_column())
            .map(str::parse)
            .transpose()?;
        let operation_id = record
            .get_str(&operation_id_column())
            .map(str::parse)
            .transpose()?;
        Ok(Self {
            extent,
            availability,
            operation_id,
        })
    }

    pub fn extent(&self) -> &KeyExtent {
        &self.extent
    }

    pub fn end_row(&self) -> Option<&str> {
        self.extent.end_row()
    }

    pub fn prev_end_row(&self) -> Option<&str> {
        self.extent.prev_end_row()
    }

    pub fn tablet_availability(&self) -> Option<TabletAvailability> {
        self.availability
    }

    pub fn operation_id(&self) -> Option<&TabletOperationId> {
        self.operation_id.as_ref()
    }
}

/// Reads tablet metadata records out of a metadata store.
pub struct TabletsReader<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> TabletsReader<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Reads the current metadata of the tablet with `extent`'s end row.
    pub fn read_tablet(&self, extent: &KeyExtent) -> Result<Option<TabletMetadata>> {
        self.store
            .read(&extent.metadata_row())?
            .map(|r| TabletMetadata::from_record(&r))
            .transpose()
    }

    /// Scans, in row order, the tablets of `table_id` that could contain
    /// `start_row` or anything after it. `None` starts at the first tablet.
    ///
    /// The tablet containing `start_row` is the first one whose end row is
    /// at or after it, which is exactly where the scan of metadata rows
    /// begins.
    pub fn overlapping(&self, table_id: &TableId, start_row: Option<&str>) -> Result<TabletsMetadata<'a>> {
        let start = match start_row {
            Some(row) => metadata_row(table_id, Some(row)),
            None => first_metadata_row(table_id),
        };
        let range = ScanRange {
            start: Bound::Included(start),
            end: Bound::Included(metadata_row(table_id, None)),
        };
        debug!("scanning tablets of {} from {:?}", table_id, range.start);
        Ok(TabletsMetadata {
            inner: self.store.scan(&range)?,
        })
    }
}

/// Iterator over scanned tablet metadata.
pub struct TabletsMetadata<'a> {
    inner: RecordIter<'a>,
}

impl Iterator for TabletsMetadata<'_> {
    type Item = Result<TabletMetadata>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|r| r.and_then(|record| TabletMetadata::from_record(&record)))
    }
}

/// Creates the metadata records for a new table split at `splits`.
///
/// Each record is written only if the row does not exist yet. Returns the
/// extents in row order.
pub fn create_tablets(
    store: &Arc<dyn RecordStore>,
    table_id: &TableId,
    splits: &[&str],
    availability: TabletAvailability,
) -> Result<Vec<KeyExtent>> {
    let mut sorted: Vec<&str> = splits.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut extents = Vec::with_capacity(sorted.len() + 1);
    let mut prev: Option<String> = None;
    for end in sorted.into_iter().map(Some).chain(std::iter::once(None)) {
        let extent = KeyExtent::new(table_id.clone(), end.map(str::to_string), prev.clone());
        ConditionalMutator::new(Arc::clone(store), extent.metadata_row())
            .require(Condition::RowAbsent)
            .put(prev_row_column(), encode_prev_row(extent.prev_end_row()))
            .put(availability_column(), availability.as_str().as_bytes().to_vec())
            .apply()?;
        prev = end.map(str::to_string);
        extents.push(extent);
    }
    debug!("created {} tablets for {}", extents.len(), table_id);
    Ok(extents)
}

/// Claims a tablet for `operation_id`, requiring that no other operation
/// holds it and that the tablet still has `extent`.
pub fn claim_operation(
    store: &Arc<dyn RecordStore>,
    extent: &KeyExtent,
    operation_id: &TabletOperationId,
) -> Result<MutationStatus> {
    ConditionalMutator::new(Arc::clone(store), extent.metadata_row())
        .require(Condition::equals(prev_row_column(), encode_prev_row(extent.prev_end_row())))
        .require(Condition::Absent(operation_id_column()))
        .put(operation_id_column(), operation_id.to_string().into_bytes())
        .try_apply()
}

/// Releases a tablet claimed by exactly `operation_id`.
pub fn release_operation(
    store: &Arc<dyn RecordStore>,
    extent: &KeyExtent,
    operation_id: &TabletOperationId,
) -> Result<MutationStatus> {
    let status = ConditionalMutator::new(Arc::clone(store), extent.metadata_row())
        .require(Condition::equals(operation_id_column(), operation_id.to_string().into_bytes()))
        .delete(operation_id_column())
        .try_apply()?;
    if status != MutationStatus::Accepted {
        warn!("releasing {} on {} was {}", operation_id, extent, status);
    }
    Ok(status)
}
