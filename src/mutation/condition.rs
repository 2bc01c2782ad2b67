use std::fmt;

use log::trace;

use crate::data_store::record::{Column, Record, RowKey};

/// A predicate over the current state of one record.
///
/// Conditions are checked by the store against the record as it is at the
/// moment the mutation is applied, never against a copy the caller read
/// earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The column must not exist.
    Absent(Column),
    /// The column must exist and hold one of the listed values.
    ValueIn { column: Column, values: Vec<Vec<u8>> },
    /// The record must have no columns at all.
    RowAbsent,
}

impl Condition {
    /// The column must exist and hold exactly `value`.
    pub fn equals(column: Column, value: impl Into<Vec<u8>>) -> Self {
        Condition::ValueIn {
            column,
            values: vec![value.into()],
        }
    }

    /// Checks the condition against the current record, `None` meaning the
    /// row does not exist.
    pub fn holds(&self, record: Option<&Record>) -> bool {
        match self {
            Condition::Absent(column) => !record.is_some_and(|r| r.contains(column)),
            Condition::ValueIn { column, values } => match record.and_then(|r| r.get(column)) {
                Some(current) => values.iter().any(|v| v.as_slice() == current),
                None => false,
            },
            Condition::RowAbsent => record.is_none_or(|r| r.is_empty()),
        }
    }
}

/// One write staged in a conditional mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnWrite {
    Put(Column, Vec<u8>),
    Delete(Column),
    /// Removes every column of the row.
    DeleteRow,
}

/// The outcome of submitting a conditional mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationStatus {
    /// Every condition held and every write was applied.
    Accepted,
    /// At least one condition failed; nothing was written.
    Rejected,
    /// The store could not report an outcome. The mutation may or may not
    /// have been applied, so the record has to be read again to find out.
    Unknown,
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationStatus::Accepted => "ACCEPTED",
            MutationStatus::Rejected => "REJECTED",
            MutationStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A condition set plus a write set for exactly one row, applied as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalMutation {
    row: RowKey,
    conditions: Vec<Condition>,
    writes: Vec<ColumnWrite>,
}

impl ConditionalMutation {
    pub fn new(row: impl Into<RowKey>) -> Self {
        Self {
            row: row.into(),
            conditions: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn row(&self) -> &str {
        &self.row
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn writes(&self) -> &[ColumnWrite] {
        &self.writes
    }

    pub fn require(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn put(&mut self, column: Column, value: impl Into<Vec<u8>>) {
        self.writes.push(ColumnWrite::Put(column, value.into()));
    }

    pub fn delete(&mut self, column: Column) {
        self.writes.push(ColumnWrite::Delete(column));
    }

    pub fn delete_row(&mut self) {
        self.writes.push(ColumnWrite::DeleteRow);
    }

    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Returns `true` if every condition holds against `current`.
    pub fn conditions_hold(&self, current: Option<&Record>) -> bool {
        for condition in &self.conditions {
            if !condition.holds(current) {
                trace!("condition {:?} failed for row {}", condition, self.row);
                return false;
            }
        }
        true
    }

    /// Produces the record that results from applying the writes to
    /// `current`. Returns `None` when the row ends up with no columns.
    pub fn apply_to(&self, current: Option<Record>) -> Option<Record> {
        let mut record = current.unwrap_or_else(|| Record::new(self.row.clone()));
        for write in &self.writes {
            match write {
                ColumnWrite::Put(column, value) => record.put(column.clone(), value.clone()),
                ColumnWrite::Delete(column) => {
                    record.remove(column);
                }
                ColumnWrite::DeleteRow => record = Record::new(self.row.clone()),
            }
        }
        if record.is_empty() { None } else { Some(record) }
    }
}
