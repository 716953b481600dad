//! # Submission Queue
//!
//! Asynchronous simulations keyed by a caller-supplied submission id.
//!
//! A submission is enqueued once. While it is pending, submitting the same
//! id again is answered with [`SubmitOutcome::AlreadyInFlight`] and nothing
//! is enqueued. A single worker drains the queue in arrival order; once a
//! submission has finished, its id may be submitted again.
//!
//! Pending entries are kept until their submission finishes. Finished
//! statuses are kept for the most recent `retained` submissions only and
//! evicted oldest first.

use aqualoop_core::{
    IndustryContext, OwnerId, ParameterSet, PredictionService, RunId, RunStore, SimulationError,
    Simulator, TreatmentStage,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;

/// One queued simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: String,
    pub owner: Option<OwnerId>,
    pub context: IndustryContext,
    pub influent: ParameterSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Completed {
        run_id: Option<RunId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<TreatmentStage>,
    },
}

impl SubmissionStatus {
    fn from_result(result: Result<aqualoop_core::SimulationOutcome, SimulationError>) -> Self {
        match result {
            Ok(outcome) => SubmissionStatus::Completed {
                run_id: outcome.persistence.run_id(),
                warning: outcome.persistence.warning(),
            },
            Err(e) => SubmissionStatus::Failed {
                stage: e.failed_stage(),
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    AlreadyInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("submission queue is full")]
    Full,
    #[error("submission worker has stopped")]
    Closed,
}

/// Submission statuses plus the finish order used for eviction.
#[derive(Debug, Default)]
struct StatusBook {
    entries: BTreeMap<String, SubmissionStatus>,
    finished: VecDeque<String>,
    retained: usize,
}

impl StatusBook {
    fn new(retained: usize) -> Self {
        Self {
            retained,
            ..Self::default()
        }
    }

    /// Record a finished submission and evict the oldest finished entries
    /// beyond the retention limit. Ids pending again are never evicted.
    fn finish(&mut self, id: String, status: SubmissionStatus) {
        self.finished.retain(|f| *f != id);
        self.finished.push_back(id.clone());
        self.entries.insert(id, status);

        while self.finished.len() > self.retained {
            let Some(oldest) = self.finished.pop_front() else {
                break;
            };
            if self.entries.get(&oldest) != Some(&SubmissionStatus::Pending) {
                self.entries.remove(&oldest);
                tracing::debug!(submission = %oldest, "finished submission status evicted");
            }
        }
    }
}

type Statuses = Arc<Mutex<StatusBook>>;

fn lock(statuses: &Statuses) -> MutexGuard<'_, StatusBook> {
    statuses.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to the submission worker. Cheap to clone.
#[derive(Clone)]
pub struct SubmissionQueue {
    tx: mpsc::Sender<Submission>,
    statuses: Statuses,
}

impl SubmissionQueue {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// `capacity` bounds the submissions buffered ahead of the worker;
    /// `retained` bounds the finished statuses kept for lookup.
    pub fn spawn<P, S>(simulator: Arc<Simulator<P, S>>, capacity: usize, retained: usize) -> Self
    where
        P: PredictionService + 'static,
        S: RunStore + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Submission>(capacity.max(1));
        let statuses: Statuses = Arc::new(Mutex::new(StatusBook::new(retained)));
        let worker_statuses = Arc::clone(&statuses);

        tokio::spawn(async move {
            while let Some(submission) = rx.recv().await {
                tracing::info!(submission = %submission.id, "processing submission");
                let result = simulator
                    .simulate_and_record(
                        &submission.context,
                        &submission.influent,
                        submission.owner.as_ref(),
                    )
                    .await;
                let status = SubmissionStatus::from_result(result);
                tracing::info!(submission = %submission.id, ?status, "submission finished");
                lock(&worker_statuses).finish(submission.id, status);
            }
            tracing::debug!("submission worker stopped");
        });

        Self { tx, statuses }
    }

    /// Enqueue `submission` unless its id is already in flight.
    pub fn submit(&self, submission: Submission) -> Result<SubmitOutcome, QueueError> {
        let mut book = lock(&self.statuses);
        let statuses = &mut book.entries;
        if statuses.get(&submission.id) == Some(&SubmissionStatus::Pending) {
            tracing::debug!(submission = %submission.id, "duplicate submission ignored");
            return Ok(SubmitOutcome::AlreadyInFlight);
        }

        let id = submission.id.clone();
        let previous = statuses.insert(id.clone(), SubmissionStatus::Pending);

        if let Err(e) = self.tx.try_send(submission) {
            match previous {
                Some(status) => statuses.insert(id, status),
                None => statuses.remove(&id),
            };
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            });
        }

        Ok(SubmitOutcome::Accepted)
    }

    /// Ids currently in flight, sorted.
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        lock(&self.statuses)
            .entries
            .iter()
            .filter(|(_, s)| **s == SubmissionStatus::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    #[must_use]
    pub fn status(&self, id: &str) -> Option<SubmissionStatus> {
        lock(&self.statuses).entries.get(id).cloned()
    }
}
