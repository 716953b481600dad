//! # aqualoop-core
//!
//! Treatment simulation pipeline for the AquaLoop water-reuse platform -
//! THE LOGIC.
//!
//! An influent water sample is pushed through a fixed, ordered catalog of
//! treatment stages. Each stage's output is computed by a remote prediction
//! service and becomes the next stage's input. A run that completes is
//! persisted once, append-only, for its owner.
//!
//! ## Components
//!
//! - `catalog`: the stage order (primary → secondary → tertiary)
//! - `executor`: one stage against the [`PredictionService`] seam
//! - `orchestrator`: the run state machine ([`Simulator`])
//! - `recorder` / `storage`: append-only persistence ([`RunStore`])
//! - `profiles` / `trends`: catalogued industries and history summaries
//! - `grading`: reuse grade of a water sample via the [`GradeService`] seam
//!
//! ## Architectural Constraints
//!
//! - No network client and no server in this crate
//! - Collaborators are injected, never global
//! - All-or-nothing runs: partial treatment chains are never persisted
//! - Persistence failures never hide a computed result

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod error;
pub mod executor;
pub mod grading;
pub mod orchestrator;
pub mod profiles;
pub mod recorder;
pub mod storage;
pub mod trends;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    IndustryContext, OwnerId, Parameter, ParameterSet, RunId, SimulationRun, StageResult,
    StoredRun, TreatmentStage,
};

pub use error::{
    CatalogError, ExecutionError, GradingError, PersistenceError, SimulationError,
    ValidationError,
};

// =============================================================================
// RE-EXPORTS: Pipeline
// =============================================================================

pub use catalog::{STANDARD_STAGES, StageCatalog};
pub use executor::{PredictionService, StageExecutor, StageRequest};

/// Re-exported so implementors of [`PredictionService`] share the same macro version.
pub use async_trait::async_trait;
pub use orchestrator::{
    PersistenceStatus, RunState, SimulationOutcome, Simulator, validate_request,
};
pub use recorder::RunRecorder;
pub use storage::{InMemoryRunStore, RedbRunStore, RunStore};

// =============================================================================
// RE-EXPORTS: Profiles & Trends
// =============================================================================

pub use profiles::{IndustryProfile, PROFILES, profile};
pub use trends::{IndexPoint, StagePoint, TrendSummary, effluent_index};

// =============================================================================
// RE-EXPORTS: Grading
// =============================================================================

pub use grading::{GradeAssessment, GradeService, Grader, QualityMetric, QualitySample, WaterGrade};
