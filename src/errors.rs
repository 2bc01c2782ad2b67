use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MoiraError {
    /// A strict mutation was rejected or its outcome could not be determined.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Arrow manipulation error: {0}")]
    ArrowError(String),

    #[error("Table {table_id} is not online: {description}")]
    TableOffline {
        table_id: String,
        description: String,
    },

    #[error("Repo stack for {fate_id} is too large, max is {max}")]
    StackOverflow { fate_id: String, max: u32 },

    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: String },

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<bincode::Error> for MoiraError {
    fn from(e: bincode::Error) -> Self {
        MoiraError::SerializationError(e.to_string())
    }
}

impl From<arrow::error::ArrowError> for MoiraError {
    fn from(e: arrow::error::ArrowError) -> Self {
        MoiraError::ArrowError(e.to_string())
    }
}

#[cfg(feature = "persistent")]
impl From<rocksdb::Error> for MoiraError {
    fn from(e: rocksdb::Error) -> Self {
        MoiraError::StorageError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MoiraError>;
