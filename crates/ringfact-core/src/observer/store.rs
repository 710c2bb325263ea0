//! # redb-backed Observer Storage
//!
//! One table, agent id → postcard-encoded [`ObserverRecord`]. Every write is
//! its own transaction, so a crash never leaves a half-written record.

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

use super::ObserverRecord;
use crate::RingfactError;

/// Table for observers: agent id -> serialized record bytes
const OBSERVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("observers");

fn io(e: impl std::fmt::Display) -> RingfactError {
    RingfactError::IoError(e.to_string())
}

/// A disk-backed observer store using redb.
pub struct RedbObserverStore {
    db: Database,
}

impl std::fmt::Debug for RedbObserverStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbObserverStore").finish_non_exhaustive()
    }
}

impl RedbObserverStore {
    /// Open or create an observer database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RingfactError> {
        let db = Database::create(path.as_ref()).map_err(io)?;
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(OBSERVERS).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }
        Ok(Self { db })
    }

    /// Insert or replace a record.
    pub fn put(&self, record: &ObserverRecord) -> Result<(), RingfactError> {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| RingfactError::SerializationError(e.to_string()))?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(OBSERVERS).map_err(io)?;
            table
                .insert(record.agent_id.as_str(), bytes.as_slice())
                .map_err(io)?;
        }
        write_txn.commit().map_err(io)
    }

    pub fn get(&self, agent_id: &str) -> Result<Option<ObserverRecord>, RingfactError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(OBSERVERS).map_err(io)?;
        match table.get(agent_id).map_err(io)? {
            Some(guard) => postcard::from_bytes(guard.value())
                .map(Some)
                .map_err(|e| RingfactError::SerializationError(e.to_string())),
            None => Ok(None),
        }
    }

    /// Agent ids in ascending order.
    pub fn agent_ids(&self) -> Result<Vec<String>, RingfactError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(OBSERVERS).map_err(io)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            ids.push(key.value().to_string());
        }
        Ok(ids)
    }

    pub fn len(&self) -> Result<u64, RingfactError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(OBSERVERS).map_err(io)?;
        table.len().map_err(io)
    }

    pub fn is_empty(&self) -> Result<bool, RingfactError> {
        Ok(self.len()? == 0)
    }
}
