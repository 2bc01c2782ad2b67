use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{MoiraError, Result};

/// Lifecycle state of a FATE transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TStatus {
    /// Created but not yet submitted for execution.
    New,
    /// Submitted and waiting for a worker.
    Submitted,
    /// A worker is running its steps.
    InProgress,
    /// A step failed and the stack is being unwound.
    FailedInProgress,
    /// Unwound after a failure.
    Failed,
    /// All steps completed.
    Successful,
    /// The record holds a status this build does not recognize.
    Unknown,
}

impl TStatus {
    /// Every status, in declaration order.
    pub const ALL: [TStatus; 7] = [
        TStatus::New,
        TStatus::Submitted,
        TStatus::InProgress,
        TStatus::FailedInProgress,
        TStatus::Failed,
        TStatus::Successful,
        TStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TStatus::New => "NEW",
            TStatus::Submitted => "SUBMITTED",
            TStatus::InProgress => "IN_PROGRESS",
            TStatus::FailedInProgress => "FAILED_IN_PROGRESS",
            TStatus::Failed => "FAILED",
            TStatus::Successful => "SUCCESSFUL",
            TStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TStatus::Failed | TStatus::Successful)
    }
}

impl fmt::Display for TStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TStatus {
    type Err = MoiraError;

    fn from_str(s: &str) -> Result<Self> {
        TStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| MoiraError::Other(format!("unknown transaction status {s}")))
    }
}
