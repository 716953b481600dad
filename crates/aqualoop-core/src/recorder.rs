//! # Run Recorder
//!
//! Persists completed runs against the owning identity. One append per run;
//! runs are never updated afterwards.

use crate::error::PersistenceError;
use crate::storage::RunStore;
use crate::types::{OwnerId, RunId, SimulationRun, StoredRun};

/// Writes finished runs to a [`RunStore`].
#[derive(Debug, Clone)]
pub struct RunRecorder<S> {
    store: S,
}

impl<S: RunStore> RunRecorder<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append `run` for `owner`.
    ///
    /// A missing owner is a precondition failure of this step only.
    pub fn record(
        &self,
        owner: Option<&OwnerId>,
        run: &SimulationRun,
    ) -> Result<RunId, PersistenceError> {
        let owner = owner.ok_or(PersistenceError::NoOwner)?;
        let id = self.store.append(owner, run)?;
        tracing::info!(owner = %owner, run_id = %id, stages = run.stages.len(), "simulation run recorded");
        Ok(id)
    }

    /// All runs of `owner`, oldest first.
    pub fn history(&self, owner: &OwnerId) -> Result<Vec<StoredRun>, PersistenceError> {
        self.store.list(owner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRunStore;
    use crate::types::{IndustryContext, ParameterSet};
    use chrono::Utc;

    fn run() -> SimulationRun {
        SimulationRun {
            industry_context: IndustryContext::new("municipal"),
            influent: ParameterSet::new(),
            stages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn missing_owner_is_rejected_without_writing() {
        let recorder = RunRecorder::new(InMemoryRunStore::new());
        assert_eq!(recorder.record(None, &run()), Err(PersistenceError::NoOwner));
        assert!(recorder.store().is_empty().unwrap());
    }

    #[test]
    fn records_and_reads_back() {
        let recorder = RunRecorder::new(InMemoryRunStore::new());
        let owner = OwnerId::new("plant-7");
        let id = recorder.record(Some(&owner), &run()).unwrap();
        let history = recorder.history(&owner).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
    }
}
