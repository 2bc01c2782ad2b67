use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The row key type for records in the store.
pub type RowKey = String;

/// Identifies one column within a record: a family and a qualifier.
///
/// Columns order by family first, then qualifier, which keeps all columns of
/// a family adjacent when a record is iterated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Column {
    pub family: String,
    pub qualifier: String,
}

impl Column {
    pub fn new(family: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.qualifier)
    }
}

/// A single addressable record: a row key and its current column values.
///
/// A record with no columns does not exist as far as the store is concerned;
/// stores drop rows whose last column was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    row: RowKey,
    columns: BTreeMap<Column, Vec<u8>>,
}

impl Record {
    /// Creates an empty record for `row`.
    pub fn new(row: impl Into<RowKey>) -> Self {
        Self {
            row: row.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn row(&self) -> &str {
        &self.row
    }

    /// Returns the current value of `column`, if present.
    pub fn get(&self, column: &Column) -> Option<&[u8]> {
        self.columns.get(column).map(|v| v.as_slice())
    }

    /// Returns the value of `column` decoded as UTF-8.
    ///
    /// Values that are not valid UTF-8 are treated as absent.
    pub fn get_str(&self, column: &Column) -> Option<&str> {
        self.get(column).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.columns.contains_key(column)
    }

    pub fn put(&mut self, column: Column, value: Vec<u8>) {
        self.columns.insert(column, value);
    }

    pub fn remove(&mut self, column: &Column) -> Option<Vec<u8>> {
        self.columns.remove(column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Iterates the columns in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&Column, &[u8])> {
        self.columns.iter().map(|(c, v)| (c, v.as_slice()))
    }

    /// Iterates the columns of one family in qualifier order.
    pub fn family<'a>(&'a self, family: &'a str) -> impl Iterator<Item = (&'a Column, &'a [u8])> {
        self.columns
            .iter()
            .filter(move |(c, _)| c.family == family)
            .map(|(c, v)| (c, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_iteration_is_qualifier_ordered() {
        let mut record = Record::new("r1");
        record.put(Column::new("repo", "b"), vec![2]);
        record.put(Column::new("tx", "status"), b"NEW".to_vec());
        record.put(Column::new("repo", "a"), vec![1]);

        let qualifiers: Vec<_> = record
            .family("repo")
            .map(|(c, _)| c.qualifier.clone())
            .collect();
        assert_eq!(qualifiers, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(record.get_str(&Column::new("tx", "status")), Some("NEW"));
        assert_eq!(record.len(), 3);
    }
}
