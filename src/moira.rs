use std::sync::Arc;

use log::debug;

use crate::config::MoiraConfig;
use crate::errors::Result;
use crate::fate::id::FateId;
use crate::fate::mutator::FateMutator;
use crate::fate::store::FateStore;
use crate::ops::readiness::ReadinessPoller;
use crate::storage::RecordStore;
use crate::tablets::catalog::TableCatalog;
use crate::tablets::metadata::TabletsReader;
use crate::tablets::mutator::{AsyncConditionalTabletsMutator, ConditionalTabletResult};

/// Moira Prelude
pub mod prelude {
    pub use crate::arrow_utils::*;
    pub use crate::config::*;
    pub use crate::data_store::mem_store::*;
    pub use crate::data_store::record::*;
    pub use crate::errors::*;
    pub use crate::fate::id::*;
    pub use crate::fate::mutator::*;
    pub use crate::fate::repo::*;
    pub use crate::fate::reservation::*;
    pub use crate::fate::schema::{FateRecord, TxInfo};
    pub use crate::fate::status::*;
    pub use crate::fate::store::*;
    pub use crate::mutation::condition::*;
    pub use crate::mutation::mutator::*;
    pub use crate::ops::readiness::*;
    pub use crate::ops::set_availability::*;
    pub use crate::storage::*;
    pub use crate::tablets::catalog::*;
    pub use crate::tablets::extent::*;
    pub use crate::tablets::metadata::*;
    pub use crate::tablets::mutator::*;
    pub use crate::tablets::range::*;
    pub use super::Moira;
}

/// The environment FATE steps run against: the store holding transaction
/// records, the store holding tablet metadata, the table catalog and the
/// configuration.
pub struct Moira {
    /// Store of FATE transaction records.
    fate_records: Arc<dyn RecordStore>,
    /// Store of tablet metadata records.
    metadata: Arc<dyn RecordStore>,
    /// Table states and locks.
    catalog: Arc<dyn TableCatalog>,
    config: MoiraConfig,
}

impl Moira {
    /// Creates a new environment. Fails if `config` is inconsistent.
    pub fn new(
        fate_records: Arc<dyn RecordStore>,
        metadata: Arc<dyn RecordStore>,
        catalog: Arc<dyn TableCatalog>,
        config: MoiraConfig,
    ) -> Result<Self> {
        config.validate()?;
        debug!("starting with {:?}", config);
        Ok(Self {
            fate_records,
            metadata,
            catalog,
            config,
        })
    }

    pub fn config(&self) -> &MoiraConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn TableCatalog {
        &*self.catalog
    }

    pub fn metadata_store(&self) -> &Arc<dyn RecordStore> {
        &self.metadata
    }

    pub fn fate_record_store(&self) -> &Arc<dyn RecordStore> {
        &self.fate_records
    }

    pub fn fate_store(&self) -> FateStore {
        FateStore::new(Arc::clone(&self.fate_records), self.config.max_repos)
    }

    /// Starts a conditional mutation of one transaction record.
    pub fn fate_mutator(&self, fate_id: FateId) -> FateMutator {
        FateMutator::new(Arc::clone(&self.fate_records), fate_id)
    }

    pub fn read_tablets(&self) -> TabletsReader<'_> {
        TabletsReader::new(&*self.metadata)
    }

    /// Starts a batch of tablet mutations whose outcomes go to
    /// `results_consumer`.
    pub fn conditionally_mutate_tablets<F>(&self, results_consumer: F) -> AsyncConditionalTabletsMutator<F>
    where
        F: FnMut(ConditionalTabletResult),
    {
        AsyncConditionalTabletsMutator::new(Arc::clone(&self.metadata), results_consumer)
    }

    pub fn readiness_poller(&self) -> ReadinessPoller {
        ReadinessPoller::from_config(&self.config)
    }
}
