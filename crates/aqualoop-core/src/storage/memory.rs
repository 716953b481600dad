//! In-memory run store.

use super::{RunStore, sort_by_creation};
use crate::error::PersistenceError;
use crate::types::{OwnerId, RunId, SimulationRun, StoredRun};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    runs: BTreeMap<OwnerId, Vec<StoredRun>>,
}

/// Volatile run store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    inner: Mutex<Inner>,
}

impl InMemoryRunStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total runs across all owners.
    pub fn len(&self) -> Result<usize, PersistenceError> {
        let inner = self.lock()?;
        Ok(inner.runs.values().map(Vec::len).sum())
    }

    pub fn is_empty(&self) -> Result<bool, PersistenceError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, PersistenceError> {
        self.inner
            .lock()
            .map_err(|_| PersistenceError::Storage("run store lock poisoned".to_string()))
    }
}

impl RunStore for InMemoryRunStore {
    fn append(&self, owner: &OwnerId, run: &SimulationRun) -> Result<RunId, PersistenceError> {
        let mut inner = self.lock()?;
        let id = RunId(inner.next_id);
        inner.next_id = inner.next_id.saturating_add(1);
        inner.runs.entry(owner.clone()).or_default().push(StoredRun {
            id,
            owner: owner.clone(),
            run: run.clone(),
        });
        Ok(id)
    }

    fn list(&self, owner: &OwnerId) -> Result<Vec<StoredRun>, PersistenceError> {
        let inner = self.lock()?;
        let mut runs = inner.runs.get(owner).cloned().unwrap_or_default();
        sort_by_creation(&mut runs);
        Ok(runs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{IndustryContext, ParameterSet};
    use chrono::{TimeZone, Utc};

    fn run_at(secs: i64) -> SimulationRun {
        SimulationRun {
            industry_context: IndustryContext::new("textile"),
            influent: ParameterSet::new(),
            stages: Vec::new(),
            created_at: Utc.timestamp_opt(secs, 0).single().unwrap(),
        }
    }

    #[test]
    fn owners_are_isolated() {
        let store = InMemoryRunStore::new();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");

        store.append(&alice, &run_at(1)).unwrap();
        store.append(&bob, &run_at(2)).unwrap();
        store.append(&alice, &run_at(3)).unwrap();

        assert_eq!(store.list(&alice).unwrap().len(), 2);
        assert_eq!(store.list(&bob).unwrap().len(), 1);
        assert!(store.list(&OwnerId::new("carol")).unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn list_is_in_creation_order() {
        let store = InMemoryRunStore::new();
        let owner = OwnerId::new("alice");

        store.append(&owner, &run_at(30)).unwrap();
        store.append(&owner, &run_at(10)).unwrap();
        store.append(&owner, &run_at(20)).unwrap();

        let times: Vec<i64> = store
            .list(&owner)
            .unwrap()
            .iter()
            .map(|r| r.run.created_at.timestamp())
            .collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn ids_increase() {
        let store = InMemoryRunStore::new();
        let owner = OwnerId::new("alice");
        let a = store.append(&owner, &run_at(1)).unwrap();
        let b = store.append(&owner, &run_at(1)).unwrap();
        assert!(b > a);
    }
}
