use std::fmt;

use serde::{Deserialize, Serialize};

/// A position in the sorted key space: row, then column family, then
/// qualifier. A key with empty columns is the first key of its row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub row: String,
    pub family: String,
    pub qualifier: String,
}

impl Key {
    /// The first key of `row`.
    pub fn row(row: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            family: String::new(),
            qualifier: String::new(),
        }
    }

    pub fn new(row: impl Into<String>, family: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }

    /// The first key of the row that immediately follows this key's row.
    pub fn following_row(&self) -> Key {
        let mut row = self.row.clone();
        row.push('\0');
        Key::row(row)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.row, self.family, self.qualifier)
    }
}

/// A range of keys with optional, independently inclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    start: Option<Key>,
    start_inclusive: bool,
    end: Option<Key>,
    end_inclusive: bool,
}

impl RowRange {
    /// Every key.
    pub fn all() -> Self {
        Self::keys(None, true, None, true)
    }

    pub fn keys(start: Option<Key>, start_inclusive: bool, end: Option<Key>, end_inclusive: bool) -> Self {
        Self {
            start,
            start_inclusive,
            end,
            end_inclusive,
        }
    }

    /// A range over whole rows. Row bounds are turned into key bounds so
    /// that an inclusive end row covers every column of that row.
    pub fn rows(
        start_row: Option<&str>,
        start_inclusive: bool,
        end_row: Option<&str>,
        end_inclusive: bool,
    ) -> Self {
        let start = start_row.map(|r| {
            let key = Key::row(r);
            if start_inclusive { key } else { key.following_row() }
        });
        let end = end_row.map(|r| {
            let key = Key::row(r);
            if end_inclusive { key.following_row() } else { key }
        });
        Self::keys(start, true, end, false)
    }

    pub fn start_key(&self) -> Option<&Key> {
        self.start.as_ref()
    }

    pub fn end_key(&self) -> Option<&Key> {
        self.end.as_ref()
    }

    /// Returns `true` if `key` sorts after the end of this range.
    pub fn after_end_key(&self, key: &Key) -> bool {
        match &self.end {
            None => false,
            Some(end) if self.end_inclusive => key > end,
            Some(end) => key >= end,
        }
    }

    /// Returns `true` if `key` sorts before the start of this range.
    pub fn before_start_key(&self, key: &Key) -> bool {
        match &self.start {
            None => false,
            Some(start) if self.start_inclusive => key < start,
            Some(start) => key <= start,
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        !self.before_start_key(key) && !self.after_end_key(key)
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.start {
            Some(k) => write!(f, "{}{}", if self.start_inclusive { "[" } else { "(" }, k)?,
            None => f.write_str("(-inf")?,
        }
        match &self.end {
            Some(k) => write!(f, ",{}{}", k, if self.end_inclusive { "]" } else { ")" }),
            None => f.write_str(",+inf)"),
        }
    }
}
