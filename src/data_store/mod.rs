/// Records and columns as kept by a store.
pub mod record;
/// The in-memory, skiplist backed store.
pub mod mem_store;
/// The RocksDB backed store.
#[cfg(feature = "persistent")]
pub mod rocks_store;
