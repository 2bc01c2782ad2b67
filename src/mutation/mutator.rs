use std::sync::Arc;

use log::{debug, warn};

use crate::data_store::record::{Column, Record};
use crate::errors::{MoiraError, Result};
use crate::mutation::condition::{Condition, ConditionalMutation, MutationStatus};
use crate::storage::RecordStore;

/// Builds and applies one conditional mutation against one row.
///
/// Conditions and writes are collected into a single [`ConditionalMutation`]
/// and sent to the store in one call, so a condition can never be separated
/// from the writes it guards.
pub struct ConditionalMutator {
    store: Arc<dyn RecordStore>,
    mutation: ConditionalMutation,
}

impl ConditionalMutator {
    pub fn new(store: Arc<dyn RecordStore>, row: impl Into<String>) -> Self {
        Self {
            store,
            mutation: ConditionalMutation::new(row.into()),
        }
    }

    pub fn row(&self) -> &str {
        self.mutation.row()
    }

    pub fn require(mut self, condition: Condition) -> Self {
        self.mutation.require(condition);
        self
    }

    pub fn put(mut self, column: Column, value: impl Into<Vec<u8>>) -> Self {
        self.mutation.put(column, value);
        self
    }

    pub fn delete(mut self, column: Column) -> Self {
        self.mutation.delete(column);
        self
    }

    pub fn delete_row(mut self) -> Self {
        self.mutation.delete_row();
        self
    }

    /// Returns the staged mutation without applying it.
    pub fn into_mutation(self) -> ConditionalMutation {
        self.mutation
    }

    /// Applies the mutation and reports the store's outcome as is.
    ///
    /// `Rejected` and `Unknown` are ordinary results here. `Err` is only
    /// returned for an empty mutation or a store failure.
    pub fn try_apply(self) -> Result<MutationStatus> {
        if !self.mutation.has_writes() {
            return Err(MoiraError::IllegalState(format!(
                "mutation for row {} has no writes",
                self.mutation.row()
            )));
        }
        let row = self.mutation.row().to_string();
        let status = self.store.submit(self.mutation)?;
        debug!("conditional mutation on {} -> {}", row, status);
        Ok(status)
    }

    /// Like [`ConditionalMutator::try_apply`], but resolves an `Unknown`
    /// outcome by reading the row back.
    ///
    /// `verifier` is given the record as it is now (`None` if the row does not
    /// exist) and must say whether it looks like the mutation was applied.
    pub fn try_apply_verified<F>(self, verifier: F) -> Result<MutationStatus>
    where
        F: FnOnce(Option<&Record>) -> bool,
    {
        let store = Arc::clone(&self.store);
        let row = self.mutation.row().to_string();
        match self.try_apply()? {
            MutationStatus::Unknown => {
                let current = store.read(&row)?;
                let status = if verifier(current.as_ref()) {
                    MutationStatus::Accepted
                } else {
                    MutationStatus::Rejected
                };
                warn!("outcome for row {} was unknown, resolved to {} by reading it back", row, status);
                Ok(status)
            }
            status => Ok(status),
        }
    }

    /// Applies the mutation, treating anything but `Accepted` as a bug in the
    /// caller.
    pub fn apply(self) -> Result<()> {
        let row = self.mutation.row().to_string();
        match self.try_apply()? {
            MutationStatus::Accepted => Ok(()),
            status => Err(MoiraError::IllegalState(format!(
                "conditional mutation on row {} was {}",
                row, status
            ))),
        }
    }
}
