use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{MoiraError, Result};

/// Separates the table id from the end row in a metadata row.
const END_ROW_SEPARATOR: char = ';';
/// Marks the last tablet of a table, the one without an end row. It sorts
/// after the separator, so the last tablet comes after all others.
const LAST_TABLET_MARKER: char = '<';

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(String);

impl TableId {
    pub fn of(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn canonical(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamespaceId(String);

impl NamespaceId {
    pub fn of(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn canonical(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The key range of one tablet: rows in `(prev_end_row, end_row]`, where a
/// missing bound means unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyExtent {
    table_id: TableId,
    end_row: Option<String>,
    prev_end_row: Option<String>,
}

impl KeyExtent {
    pub fn new(table_id: TableId, end_row: Option<String>, prev_end_row: Option<String>) -> Self {
        Self {
            table_id,
            end_row,
            prev_end_row,
        }
    }

    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    pub fn end_row(&self) -> Option<&str> {
        self.end_row.as_deref()
    }

    pub fn prev_end_row(&self) -> Option<&str> {
        self.prev_end_row.as_deref()
    }

    /// The row of this tablet's metadata record.
    pub fn metadata_row(&self) -> String {
        metadata_row(&self.table_id, self.end_row.as_deref())
    }

    pub fn contains(&self, row: &str) -> bool {
        self.prev_end_row.as_deref().is_none_or(|prev| row > prev)
            && self.end_row.as_deref().is_none_or(|end| row <= end)
    }

    /// Splits a metadata row back into its table id and end row.
    pub fn parse_metadata_row(row: &str) -> Result<(TableId, Option<String>)> {
        if let Some(table) = row.strip_suffix(LAST_TABLET_MARKER) {
            if !table.contains(END_ROW_SEPARATOR) {
                return Ok((TableId::of(table), None));
            }
        }
        match row.split_once(END_ROW_SEPARATOR) {
            Some((table, end)) => Ok((TableId::of(table), Some(end.to_string()))),
            None => Err(MoiraError::InvalidId(format!("not a metadata row: {row}"))),
        }
    }
}

/// Metadata row for the tablet of `table_id` ending at `end_row`.
pub fn metadata_row(table_id: &TableId, end_row: Option<&str>) -> String {
    match end_row {
        Some(end) => format!("{}{}{}", table_id, END_ROW_SEPARATOR, end),
        None => format!("{}{}", table_id, LAST_TABLET_MARKER),
    }
}

/// The smallest metadata row of `table_id`.
pub(crate) fn first_metadata_row(table_id: &TableId) -> String {
    format!("{}{}", table_id, END_ROW_SEPARATOR)
}

impl fmt::Display for KeyExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{}",
            self.table_id,
            self.end_row.as_deref().unwrap_or("<"),
            self.prev_end_row.as_deref().unwrap_or("<")
        )
    }
}
