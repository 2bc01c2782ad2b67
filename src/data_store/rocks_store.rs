use std::ops::Bound;
use std::path::Path;

use log::{debug, trace};
use parking_lot::Mutex;
use rocksdb::{DB, Direction, IteratorMode, Options, WriteOptions};

use crate::data_store::record::Record;
use crate::errors::Result;
use crate::mutation::condition::{ConditionalMutation, MutationStatus};
use crate::storage::{RecordIter, RecordStore, ScanRange};

/// A durable record store on top of RocksDB.
///
/// Each row is kept as one bincode-encoded [`Record`] under its row key, so a
/// conditional mutation is a read-check-write of a single RocksDB key.
/// Writes are synced before the outcome is reported, so an accepted FATE
/// mutation survives a process crash.
pub struct RocksRecordStore {
    db: DB,
    write_lock: Mutex<()>,
}

impl RocksRecordStore {
    /// Opens (or creates) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref())?;
        debug!("opened record store at {}", path.as_ref().display());
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn load(&self, row: &str) -> Result<Option<Record>> {
        match self.db.get(row.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl RecordStore for RocksRecordStore {
    fn submit(&self, mutation: ConditionalMutation) -> Result<MutationStatus> {
        let _guard = self.write_lock.lock();
        let current = self.load(mutation.row())?;
        if !mutation.conditions_hold(current.as_ref()) {
            trace!("mutation on row {} -> REJECTED", mutation.row());
            return Ok(MutationStatus::Rejected);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        let written = match mutation.apply_to(current) {
            Some(record) => {
                let bytes = bincode::serialize(&record)?;
                self.db.put_opt(mutation.row().as_bytes(), bytes, &write_opts)
            }
            None => self.db.delete_opt(mutation.row().as_bytes(), &write_opts),
        };
        match written {
            Ok(()) => {
                trace!("mutation on row {} -> ACCEPTED", mutation.row());
                Ok(MutationStatus::Accepted)
            }
            Err(e) => {
                // the write may have reached the WAL before failing
                debug!("write for row {} failed: {}", mutation.row(), e);
                Ok(MutationStatus::Unknown)
            }
        }
    }

    fn read(&self, row: &str) -> Result<Option<Record>> {
        self.load(row)
    }

    fn scan(&self, range: &ScanRange) -> Result<RecordIter<'_>> {
        let mode = match &range.start {
            Bound::Unbounded => IteratorMode::Start,
            Bound::Included(start) | Bound::Excluded(start) => {
                IteratorMode::From(start.as_bytes(), Direction::Forward)
            }
        };
        let lower = range.clone();
        let upper = range.clone();
        let iter = self
            .db
            .iterator(mode)
            .map(|item| -> Result<Record> {
                let (_, value) = item?;
                Ok(bincode::deserialize(&value)?)
            })
            .filter(move |item| match item {
                Ok(record) => !lower.is_before_start(record.row()),
                Err(_) => true,
            })
            .take_while(move |item| match item {
                Ok(record) => !upper.is_past_end(record.row()),
                Err(_) => true,
            });
        Ok(Box::new(iter))
    }
}
