//! # Run Storage
//!
//! Append-only stores for completed simulation runs, keyed by owner.
//!
//! Two backends:
//! - `InMemoryRunStore`: volatile, used by tests and the `memory` backend
//! - `RedbRunStore`: disk-backed ACID storage using redb
//!
//! `list` always returns runs in creation order (`created_at`, then id).

mod memory;
mod redb_store;

pub use memory::InMemoryRunStore;
pub use redb_store::RedbRunStore;

use crate::error::PersistenceError;
use crate::types::{OwnerId, RunId, SimulationRun, StoredRun};
use std::sync::Arc;

/// Persistence seam for completed runs.
///
/// Implementations provide their own write isolation; callers perform one
/// independent append per run and never update or delete.
pub trait RunStore: Send + Sync {
    /// Append a run for `owner` and return its new id.
    fn append(&self, owner: &OwnerId, run: &SimulationRun) -> Result<RunId, PersistenceError>;

    /// All runs of `owner` in creation order.
    fn list(&self, owner: &OwnerId) -> Result<Vec<StoredRun>, PersistenceError>;
}

impl<T: RunStore + ?Sized> RunStore for Arc<T> {
    fn append(&self, owner: &OwnerId, run: &SimulationRun) -> Result<RunId, PersistenceError> {
        (**self).append(owner, run)
    }

    fn list(&self, owner: &OwnerId) -> Result<Vec<StoredRun>, PersistenceError> {
        (**self).list(owner)
    }
}

/// Sort runs into creation order.
pub(crate) fn sort_by_creation(runs: &mut [StoredRun]) {
    runs.sort_by(|a, b| {
        a.run
            .created_at
            .cmp(&b.run.created_at)
            .then(a.id.cmp(&b.id))
    });
}
