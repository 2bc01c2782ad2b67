//! Common utilities for Moira integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use moira::prelude::*;
use serde::{Deserialize, Serialize};

/// Split points of the seeded test table: ten tablets, the last one open
/// ended.
pub const SPLITS: [&str; 9] = ["100", "200", "300", "400", "500", "600", "700", "800", "900"];

/// A step with no behaviour, only something to serialize onto a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRepo {
    pub name: String,
}

impl TestRepo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Everything a test needs, with the concrete stores kept around for fault
/// injection and outcome counting.
pub struct TestEnv {
    pub moira: Moira,
    pub fate_records: Arc<MemRecordStore>,
    pub metadata: Arc<MemRecordStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub table_id: TableId,
    pub namespace_id: NamespaceId,
    pub extents: Vec<KeyExtent>,
}

impl TestEnv {
    pub fn metadata_store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(self.moira.metadata_store())
    }

    pub fn fate_store(&self) -> FateStore {
        self.moira.fate_store()
    }

    /// Extent of the seeded tablet ending at `end_row`.
    pub fn extent(&self, end_row: Option<&str>) -> KeyExtent {
        self.extents
            .iter()
            .find(|e| e.end_row() == end_row)
            .cloned()
            .expect("no such tablet")
    }

    /// Current availability of every tablet, keyed by end row.
    pub fn availabilities(&self) -> Vec<(Option<String>, Option<TabletAvailability>)> {
        self.moira
            .read_tablets()
            .overlapping(&self.table_id, None)
            .unwrap()
            .map(|tm| {
                let tm = tm.unwrap();
                (tm.end_row().map(str::to_string), tm.tablet_availability())
            })
            .collect()
    }

    pub fn count_with(&self, availability: TabletAvailability) -> usize {
        self.availabilities()
            .iter()
            .filter(|(_, a)| *a == Some(availability))
            .count()
    }

    pub fn set_availability(&self, range: RowRange, availability: TabletAvailability) -> SetTabletAvailability {
        SetTabletAvailability::new(
            self.table_id.clone(),
            self.namespace_id.clone(),
            range,
            availability,
        )
    }
}

pub fn setup_moira() -> TestEnv {
    setup_moira_with(MoiraConfig::default())
}

/// Builds an environment whose table `"2"` is online and split at
/// [`SPLITS`], every tablet `ONDEMAND`.
pub fn setup_moira_with(config: MoiraConfig) -> TestEnv {
    let fate_records = Arc::new(MemRecordStore::new());
    let metadata = Arc::new(MemRecordStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let table_id = TableId::of("2");
    let namespace_id = NamespaceId::of("+default");

    let metadata_dyn: Arc<dyn RecordStore> = metadata.clone();
    let extents = create_tablets(&metadata_dyn, &table_id, &SPLITS, TabletAvailability::Ondemand)
        .expect("failed to seed tablets");
    catalog.set_table_state(&table_id, TableState::Online);

    let moira = Moira::new(fate_records.clone(), metadata_dyn, catalog.clone(), config)
        .expect("invalid config");

    TestEnv {
        moira,
        fate_records,
        metadata,
        catalog,
        table_id,
        namespace_id,
        extents,
    }
}

pub fn test_lock_id(node: &str) -> LockId {
    LockId::new("/locks", node, 50)
}
