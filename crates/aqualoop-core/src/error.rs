//! # Error Types
//!
//! Three failure kinds surface from a simulation:
//! - `ValidationError`: the request is unusable; raised before any stage runs
//! - `ExecutionError`: the prediction service failed a stage; the run is discarded
//! - `PersistenceError`: the finished run could not be saved; the computed
//!   result is still returned to the caller
//!
//! The orchestrator returns `SimulationError` for the first two. Persistence
//! problems travel next to the run in `SimulationOutcome` instead.

use crate::grading::QualityMetric;
use crate::types::{Parameter, TreatmentStage};
use thiserror::Error;

// =============================================================================
// VALIDATION
// =============================================================================

/// A simulation request that cannot start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No industry context was supplied.
    #[error("industry context is missing")]
    MissingIndustry,

    /// The influent sample lacks a parameter.
    #[error("influent parameter '{0}' is missing")]
    MissingParameter(Parameter),

    /// A parameter is not a finite number.
    #[error("influent parameter '{0}' is not a finite number")]
    NonNumeric(Parameter),

    /// A stage name that is not in the catalog vocabulary.
    #[error("unknown treatment stage '{0}'")]
    UnknownStage(String),
}

// =============================================================================
// EXECUTION
// =============================================================================

/// A stage prediction that did not produce a usable parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The prediction service could not be reached.
    #[error("prediction service unreachable: {0}")]
    Unreachable(String),

    /// The transport gave up waiting for a response.
    #[error("prediction service timed out")]
    TimedOut,

    /// The service answered with a non-success status.
    #[error("prediction service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body is not a parameter object.
    #[error("malformed prediction: {0}")]
    Malformed(String),

    /// The response lacks a parameter.
    #[error("prediction is missing parameter '{0}'")]
    MissingParameter(Parameter),

    /// The response holds a non-numeric or non-finite value.
    #[error("prediction value for '{0}' is not a finite number")]
    NonNumeric(Parameter),
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// A completed run that could not be written, or a history that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// No owner identity is available for the run.
    #[error("no owner identity available; run was not saved")]
    NoOwner,

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// CATALOG
// =============================================================================

/// An invalid stage catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("stage catalog is empty")]
    Empty,

    #[error("stage '{0}' appears more than once in the catalog")]
    Duplicate(TreatmentStage),
}

// =============================================================================
// GRADING
// =============================================================================

/// Why a sample could not be graded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    /// The sample lacks a metric.
    #[error("quality metric '{0}' is missing")]
    MissingMetric(QualityMetric),

    /// A metric is not a finite number.
    #[error("quality metric '{0}' is not a finite number")]
    NonNumeric(QualityMetric),

    /// The classifier could not be called or answered with a non-object.
    #[error("grade service failed: {0}")]
    Service(#[from] ExecutionError),

    /// The classifier answer lacks a required field.
    #[error("grade response is missing '{0}'")]
    MissingField(&'static str),

    #[error("unknown grade {0}")]
    UnknownGrade(String),

    /// The classifier reported its own failure.
    #[error("grade service rejected the sample: {0}")]
    Rejected(String),
}

impl GradingError {
    /// True when the sample itself was unusable and no call was made.
    #[must_use]
    pub fn is_invalid_sample(&self) -> bool {
        matches!(self, GradingError::MissingMetric(_) | GradingError::NonNumeric(_))
    }
}

// =============================================================================
// SIMULATION
// =============================================================================

/// Why a simulation produced no run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Rejected before any stage ran.
    #[error("invalid simulation request: {0}")]
    Validation(#[from] ValidationError),

    /// A stage failed; every stage computed before it was discarded.
    #[error("stage '{stage}' (#{index}) failed: {source}")]
    Execution {
        stage: TreatmentStage,
        index: usize,
        #[source]
        source: ExecutionError,
    },
}

impl SimulationError {
    /// Stage that failed, for execution failures.
    #[must_use]
    pub fn failed_stage(&self) -> Option<TreatmentStage> {
        match self {
            SimulationError::Execution { stage, .. } => Some(*stage),
            SimulationError::Validation(_) => None,
        }
    }

    /// True when the request was rejected before any stage ran.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, SimulationError::Validation(_))
    }
}
