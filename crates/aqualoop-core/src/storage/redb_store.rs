//! # redb-backed Run Storage
//!
//! A disk-backed run store using the redb embedded database.
//!
//! Layout:
//! - `runs`: run id (u64) -> postcard-encoded `(OwnerId, SimulationRun)`
//! - `owner_runs`: owner -> run ids (multimap)
//! - `metadata`: `next_run_id` counter
//!
//! Every append is a single write transaction covering all three tables,
//! so a run is either fully indexed or absent.

use super::{RunStore, sort_by_creation};
use crate::error::PersistenceError;
use crate::types::{OwnerId, RunId, SimulationRun, StoredRun};
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};
use std::path::Path;

/// Table for runs: RunId(u64) -> serialized (OwnerId, SimulationRun) bytes
const RUNS: TableDefinition<u64, &[u8]> = TableDefinition::new("runs");

/// Index from owner to the ids of their runs.
const OWNER_RUNS: MultimapTableDefinition<&str, u64> = MultimapTableDefinition::new("owner_runs");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_RUN_ID: &str = "next_run_id";

fn storage(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Storage(e.to_string())
}

fn serialization(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Serialization(e.to_string())
}

/// A disk-backed, append-only run store.
pub struct RedbRunStore {
    db: Database,
}

impl std::fmt::Debug for RedbRunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRunStore").finish_non_exhaustive()
    }
}

impl RedbRunStore {
    /// Open or create a run database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let db = Database::create(path.as_ref()).map_err(storage)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage)?;
            let _ = write_txn.open_table(RUNS).map_err(storage)?;
            let _ = write_txn.open_multimap_table(OWNER_RUNS).map_err(storage)?;
            let _ = write_txn.open_table(METADATA).map_err(storage)?;
            write_txn.commit().map_err(storage)?;
        }

        Ok(Self { db })
    }

    /// Number of runs across all owners.
    pub fn run_count(&self) -> Result<u64, PersistenceError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(RUNS).map_err(storage)?;
        table.len().map_err(storage)
    }
}

impl RunStore for RedbRunStore {
    fn append(&self, owner: &OwnerId, run: &SimulationRun) -> Result<RunId, PersistenceError> {
        let bytes = postcard::to_allocvec(&(owner, run)).map_err(serialization)?;

        let write_txn = self.db.begin_write().map_err(storage)?;
        let id = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage)?;
            let id = meta
                .get(NEXT_RUN_ID)
                .map_err(storage)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta.insert(NEXT_RUN_ID, id.saturating_add(1))
                .map_err(storage)?;

            let mut runs = write_txn.open_table(RUNS).map_err(storage)?;
            runs.insert(id, bytes.as_slice()).map_err(storage)?;

            let mut index = write_txn
                .open_multimap_table(OWNER_RUNS)
                .map_err(storage)?;
            index.insert(owner.as_str(), id).map_err(storage)?;
            id
        };
        write_txn.commit().map_err(storage)?;

        tracing::debug!(owner = %owner, run_id = id, "run appended");
        Ok(RunId(id))
    }

    fn list(&self, owner: &OwnerId) -> Result<Vec<StoredRun>, PersistenceError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let index = read_txn
            .open_multimap_table(OWNER_RUNS)
            .map_err(storage)?;
        let runs = read_txn.open_table(RUNS).map_err(storage)?;

        let mut out = Vec::new();
        for entry in index.get(owner.as_str()).map_err(storage)? {
            let id = entry.map_err(storage)?.value();
            let data = runs.get(id).map_err(storage)?.ok_or_else(|| {
                PersistenceError::Storage(format!("owner index references missing run {id}"))
            })?;
            let (stored_owner, run): (OwnerId, SimulationRun) =
                postcard::from_bytes(data.value()).map_err(serialization)?;
            out.push(StoredRun {
                id: RunId(id),
                owner: stored_owner,
                run,
            });
        }

        sort_by_creation(&mut out);
        Ok(out)
    }
}
