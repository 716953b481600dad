//! # Run Orchestrator
//!
//! Executes the stage catalog against an influent sample, threading each
//! stage's output into the next stage's input.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──validate──▶ Running(0) ──▶ Running(1) ──▶ … ──▶ Completed
//!   │                    │              │
//!   └─ ValidationError   └──────────────┴──▶ Failed (ExecutionError)
//! ```
//!
//! - Validation happens before any prediction call.
//! - A failed stage discards every stage computed so far; nothing is persisted.
//! - On completion the run is handed to the recorder. A persistence failure
//!   is reported next to the run, never instead of it.
//!
//! Stages run strictly one after another. Independent invocations share
//! nothing but the store.

use crate::catalog::StageCatalog;
use crate::error::{PersistenceError, SimulationError, ValidationError};
use crate::executor::{PredictionService, StageExecutor};
use crate::recorder::RunRecorder;
use crate::storage::RunStore;
use crate::types::{
    IndustryContext, OwnerId, ParameterSet, RunId, SimulationRun, StageResult, TreatmentStage,
};
use chrono::Utc;
use std::fmt;

// =============================================================================
// RUN STATE
// =============================================================================

/// Lifecycle of one simulation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Executing the stage at this catalog index.
    Running(usize),
    Completed,
    Failed,
}

impl RunState {
    /// True for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Running(i) => write!(f, "running({i})"),
            RunState::Completed => f.write_str("completed"),
            RunState::Failed => f.write_str("failed"),
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// What happened when the completed run was handed to the recorder.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceStatus {
    Persisted(RunId),
    /// Non-blocking: the run is still valid and displayable.
    Failed(PersistenceError),
}

impl PersistenceStatus {
    #[must_use]
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            PersistenceStatus::Persisted(id) => Some(*id),
            PersistenceStatus::Failed(_) => None,
        }
    }

    /// Warning text for a run that was computed but not saved.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match self {
            PersistenceStatus::Persisted(_) => None,
            PersistenceStatus::Failed(e) => Some(e.to_string()),
        }
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistenceStatus::Persisted(_))
    }
}

/// A computed run plus its persistence result.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub run: SimulationRun,
    pub persistence: PersistenceStatus,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// The `Idle → Running(0)` guard: context present, influent complete.
pub fn validate_request(
    context: &IndustryContext,
    influent: &ParameterSet,
) -> Result<(), ValidationError> {
    context.ensure_present()?;
    influent.ensure_complete()
}

// =============================================================================
// SIMULATOR
// =============================================================================

/// Drives the catalog, the executor and the recorder for each invocation.
///
/// Collaborators are injected; the simulator holds no per-run state, so one
/// instance can serve concurrent invocations.
#[derive(Debug)]
pub struct Simulator<P, S> {
    catalog: StageCatalog,
    executor: StageExecutor<P>,
    recorder: RunRecorder<S>,
}

impl<P: PredictionService, S: RunStore> Simulator<P, S> {
    #[must_use]
    pub fn new(catalog: StageCatalog, service: P, store: S) -> Self {
        Self {
            catalog,
            executor: StageExecutor::new(service),
            recorder: RunRecorder::new(store),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn recorder(&self) -> &RunRecorder<S> {
        &self.recorder
    }

    /// Compute a run without persisting it.
    ///
    /// The catalog is folded into the stage sequence: each step consumes
    /// the stages computed so far and returns them extended by one.
    pub async fn run_simulation(
        &self,
        context: &IndustryContext,
        influent: &ParameterSet,
    ) -> Result<SimulationRun, SimulationError> {
        let industry = context.industry_type();

        if let Err(e) = validate_request(context, influent) {
            tracing::warn!(
                state = %RunState::Failed,
                stage = self.catalog.stages().first().map_or("none", |s| s.key()),
                index = 0,
                industry,
                error = %e,
                "simulation request rejected"
            );
            return Err(e.into());
        }

        let mut stages = Vec::with_capacity(self.catalog.len());
        for (index, stage) in self.catalog.iter().enumerate() {
            stages = self.step(stages, index, stage, context, influent).await?;
        }

        if let Some(last) = stages.last() {
            tracing::info!(
                state = %RunState::Completed,
                stage = %last.stage,
                index = stages.len() - 1,
                industry,
                "simulation completed"
            );
        }

        Ok(SimulationRun {
            industry_context: context.clone(),
            influent: influent.clone(),
            stages,
            created_at: Utc::now(),
        })
    }

    /// One fold step: run `stage` on the previous stage's output (or the
    /// influent for the first stage) and append its result.
    async fn step(
        &self,
        mut stages: Vec<StageResult>,
        index: usize,
        stage: TreatmentStage,
        context: &IndustryContext,
        influent: &ParameterSet,
    ) -> Result<Vec<StageResult>, SimulationError> {
        let industry = context.industry_type();
        tracing::debug!(
            state = %RunState::Running(index),
            stage = %stage,
            index,
            industry,
            "stage started"
        );

        // Input of stage i is exactly the output of stage i-1.
        let before = stages.last().map_or(influent, |prev| &prev.after).clone();

        match self.executor.execute(&before, stage, context).await {
            Ok(after) => {
                stages.push(StageResult {
                    stage,
                    before,
                    after,
                });
                Ok(stages)
            }
            Err(source) => {
                tracing::error!(
                    state = %RunState::Failed,
                    stage = %stage,
                    index,
                    industry,
                    discarded = stages.len(),
                    error = %source,
                    "stage failed; discarding run"
                );
                Err(SimulationError::Execution {
                    stage,
                    index,
                    source,
                })
            }
        }
    }

    /// Compute a run, then persist it for `owner`.
    ///
    /// Only validation and execution failures are errors. Persistence
    /// problems, including a missing owner, are reported in the outcome.
    pub async fn simulate_and_record(
        &self,
        context: &IndustryContext,
        influent: &ParameterSet,
        owner: Option<&OwnerId>,
    ) -> Result<SimulationOutcome, SimulationError> {
        let run = self.run_simulation(context, influent).await?;

        let persistence = match self.recorder.record(owner, &run) {
            Ok(id) => PersistenceStatus::Persisted(id),
            Err(e) => {
                tracing::warn!(error = %e, "simulation run computed but not persisted");
                PersistenceStatus::Failed(e)
            }
        };

        Ok(SimulationOutcome { run, persistence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_display() {
        assert_eq!(RunState::Running(2).to_string(), "running(2)");
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Idle.is_terminal());
    }

    #[test]
    fn persistence_status_warning() {
        let failed = PersistenceStatus::Failed(PersistenceError::NoOwner);
        assert!(failed.warning().is_some());
        assert_eq!(failed.run_id(), None);

        let ok = PersistenceStatus::Persisted(RunId(4));
        assert!(ok.is_persisted());
        assert_eq!(ok.warning(), None);
    }
}
