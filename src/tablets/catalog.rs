use ahash::AHashMap as HashMap;
use log::debug;
use parking_lot::RwLock;

use crate::fate::id::FateId;
use crate::tablets::extent::{NamespaceId, TableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableState {
    New,
    Online,
    Offline,
    Deleting,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockType {
    Read,
    Write,
}

/// What table operations need to know about tables and namespaces beyond
/// their tablets: the table's state and the table/namespace locks a
/// transaction holds while it works on them.
pub trait TableCatalog: Send + Sync {
    fn table_state(&self, table_id: &TableId) -> TableState;

    fn unreserve_table(&self, table_id: &TableId, fate_id: &FateId, lock_type: LockType);

    fn unreserve_namespace(&self, namespace_id: &NamespaceId, fate_id: &FateId, lock_type: LockType);
}

/// A table catalog kept in memory.
///
/// Lock reservations are tracked per transaction so that releases can be
/// observed; acquiring them is left to whoever sets up the operation.
#[derive(Default)]
pub struct InMemoryCatalog {
    states: RwLock<HashMap<TableId, TableState>>,
    table_locks: RwLock<HashMap<(TableId, FateId), LockType>>,
    namespace_locks: RwLock<HashMap<(NamespaceId, FateId), LockType>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table_state(&self, table_id: &TableId, state: TableState) {
        debug!("table {} is now {:?}", table_id, state);
        self.states.write().insert(table_id.clone(), state);
    }

    pub fn reserve_table(&self, table_id: &TableId, fate_id: &FateId, lock_type: LockType) {
        self.table_locks
            .write()
            .insert((table_id.clone(), *fate_id), lock_type);
    }

    pub fn reserve_namespace(&self, namespace_id: &NamespaceId, fate_id: &FateId, lock_type: LockType) {
        self.namespace_locks
            .write()
            .insert((namespace_id.clone(), *fate_id), lock_type);
    }

    pub fn table_lock(&self, table_id: &TableId, fate_id: &FateId) -> Option<LockType> {
        self.table_locks
            .read()
            .get(&(table_id.clone(), *fate_id))
            .copied()
    }

    pub fn namespace_lock(&self, namespace_id: &NamespaceId, fate_id: &FateId) -> Option<LockType> {
        self.namespace_locks
            .read()
            .get(&(namespace_id.clone(), *fate_id))
            .copied()
    }
}

impl TableCatalog for InMemoryCatalog {
    fn table_state(&self, table_id: &TableId) -> TableState {
        self.states
            .read()
            .get(table_id)
            .copied()
            .unwrap_or(TableState::Unknown)
    }

    fn unreserve_table(&self, table_id: &TableId, fate_id: &FateId, lock_type: LockType) {
        let mut locks = self.table_locks.write();
        let key = (table_id.clone(), *fate_id);
        if locks.get(&key) == Some(&lock_type) {
            locks.remove(&key);
            debug!("{} released {:?} lock on table {}", fate_id, lock_type, table_id);
        }
    }

    fn unreserve_namespace(&self, namespace_id: &NamespaceId, fate_id: &FateId, lock_type: LockType) {
        let mut locks = self.namespace_locks.write();
        let key = (namespace_id.clone(), *fate_id);
        if locks.get(&key) == Some(&lock_type) {
            locks.remove(&key);
            debug!("{} released {:?} lock on namespace {}", fate_id, lock_type, namespace_id);
        }
    }
}
