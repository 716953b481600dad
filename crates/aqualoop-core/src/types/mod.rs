//! # Core Type Definitions
//!
//! Data model of the treatment simulation pipeline:
//! - Measured water-quality parameters (`Parameter`, `ParameterSet`)
//! - Treatment stages (`TreatmentStage`)
//! - Run records (`StageResult`, `SimulationRun`, `StoredRun`)
//! - Identities (`OwnerId`, `RunId`) and the industry context of a run
//!
//! A `ParameterSet` is *complete* when every `Parameter` is present and
//! finite. Only complete sets ever enter or leave a treatment stage.

use crate::error::{ExecutionError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// PARAMETERS
// =============================================================================

/// A measured water-quality parameter.
///
/// The serialized names are the wire names used by the prediction service
/// and by stored runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Biochemical oxygen demand.
    Bod,
    /// Chemical oxygen demand.
    Cod,
    /// Acidity index.
    Ph,
    /// Turbidity.
    Turbidity,
    /// Total suspended solids.
    Tss,
}

impl Parameter {
    /// Every parameter, in wire order.
    pub const ALL: [Parameter; 5] = [
        Parameter::Bod,
        Parameter::Cod,
        Parameter::Ph,
        Parameter::Turbidity,
        Parameter::Tss,
    ];

    /// Wire name of the parameter.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Parameter::Bod => "bod",
            Parameter::Cod => "cod",
            Parameter::Ph => "ph",
            Parameter::Turbidity => "turbidity",
            Parameter::Tss => "tss",
        }
    }

    /// Display unit.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Parameter::Bod | Parameter::Cod | Parameter::Tss => "mg/L",
            Parameter::Turbidity => "NTU",
            Parameter::Ph => "",
        }
    }

    /// Look a parameter up by its wire name.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// PARAMETER SET
// =============================================================================

/// Named numeric water-quality measurements treated as one unit.
///
/// Ordered by `Parameter` so serialization and display are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<Parameter, f64>);

impl ParameterSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        self.0.insert(parameter, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, parameter: Parameter, value: f64) {
        self.0.insert(parameter, value);
    }

    /// Value of a parameter, if present.
    #[must_use]
    pub fn get(&self, parameter: Parameter) -> Option<f64> {
        self.0.get(&parameter).copied()
    }

    /// Iterate over `(parameter, value)` pairs in parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f64)> + '_ {
        self.0.iter().map(|(p, v)| (*p, *v))
    }

    /// Number of parameters present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameter is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that every parameter is present and finite.
    ///
    /// Returns the first offending parameter in wire order.
    pub fn ensure_complete(&self) -> Result<(), ValidationError> {
        for parameter in Parameter::ALL {
            match self.get(parameter) {
                None => return Err(ValidationError::MissingParameter(parameter)),
                Some(v) if !v.is_finite() => {
                    return Err(ValidationError::NonNumeric(parameter));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// True when every parameter is present and finite.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.ensure_complete().is_ok()
    }

    /// Build a set from a JSON object supplied by an operator.
    ///
    /// Keys that are not parameters are ignored. Known keys must hold JSON
    /// numbers. Missing keys are left absent; completeness is checked by
    /// the orchestrator before any stage runs.
    pub fn from_json_map(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ValidationError> {
        let mut set = Self::new();
        for (key, value) in map {
            let Some(parameter) = Parameter::from_key(key) else {
                continue;
            };
            let number = value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or(ValidationError::NonNumeric(parameter))?;
            set.insert(parameter, number);
        }
        Ok(set)
    }

    /// Validate a prediction service response body.
    ///
    /// The body must be a JSON object holding every parameter as a finite
    /// number. Extra keys are ignored, so the result always has exactly
    /// the full parameter key set.
    pub fn from_prediction(body: &serde_json::Value) -> Result<Self, ExecutionError> {
        let object = body.as_object().ok_or_else(|| {
            ExecutionError::Malformed(format!("expected a JSON object, got {}", kind_of(body)))
        })?;

        let mut set = Self::new();
        for parameter in Parameter::ALL {
            let value = object
                .get(parameter.key())
                .ok_or(ExecutionError::MissingParameter(parameter))?;
            let number = value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or(ExecutionError::NonNumeric(parameter))?;
            set.insert(parameter, number);
        }
        Ok(set)
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl FromIterator<(Parameter, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (Parameter, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// TREATMENT STAGES
// =============================================================================

/// One named treatment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentStage {
    /// Screening, sedimentation and equalization.
    Primary,
    /// Biological treatment.
    Secondary,
    /// Filtration and polishing.
    Tertiary,
}

impl TreatmentStage {
    /// Wire name sent as `treatment_stage`.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            TreatmentStage::Primary => "primary",
            TreatmentStage::Secondary => "secondary",
            TreatmentStage::Tertiary => "tertiary",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TreatmentStage::Primary => "Primary Treatment",
            TreatmentStage::Secondary => "Secondary Treatment",
            TreatmentStage::Tertiary => "Tertiary Treatment",
        }
    }
}

impl fmt::Display for TreatmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TreatmentStage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(TreatmentStage::Primary),
            "secondary" => Ok(TreatmentStage::Secondary),
            "tertiary" => Ok(TreatmentStage::Tertiary),
            other => Err(ValidationError::UnknownStage(other.to_string())),
        }
    }
}

// =============================================================================
// IDENTITIES
// =============================================================================

/// Identity that owns persisted runs, supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    /// Create an owner identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier a store assigns to a persisted run. Increases with every append.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// INDUSTRY CONTEXT
// =============================================================================

/// Industry metadata sent along with every stage prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryContext {
    /// Industry type, e.g. `textile`. Sent as `industry_type`.
    pub industry: String,
    /// Operator-entered name, used when the industry is not catalogued.
    ///
    /// Always serialized: stored runs use a non-self-describing encoding.
    #[serde(default)]
    pub manual_name: Option<String>,
}

impl IndustryContext {
    /// Create a context for an industry type.
    #[must_use]
    pub fn new(industry: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            manual_name: None,
        }
    }

    /// Attach an operator-entered industry name. Blank names are dropped.
    #[must_use]
    pub fn with_manual_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.manual_name = (!name.trim().is_empty()).then(|| name.trim().to_string());
        self
    }

    /// Industry type as sent to the prediction service.
    #[must_use]
    pub fn industry_type(&self) -> &str {
        self.industry.trim()
    }

    /// Name to show for this run.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.manual_name.as_deref().unwrap_or(self.industry_type())
    }

    /// A context is usable when its industry type is non-blank.
    pub fn ensure_present(&self) -> Result<(), ValidationError> {
        if self.industry_type().is_empty() {
            return Err(ValidationError::MissingIndustry);
        }
        Ok(())
    }
}

// =============================================================================
// RUN RECORDS
// =============================================================================

/// One pipeline step: the parameters handed to a stage and what it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: TreatmentStage,
    pub before: ParameterSet,
    pub after: ParameterSet,
}

impl StageResult {
    /// Percentage removed by this stage for one parameter.
    ///
    /// Zero when the stage did not lower the value or the inlet value is
    /// not positive.
    #[must_use]
    pub fn reduction_percent(&self, parameter: Parameter) -> f64 {
        match (self.before.get(parameter), self.after.get(parameter)) {
            (Some(before), Some(after)) if before > 0.0 && before > after => {
                (before - after) / before * 100.0
            }
            _ => 0.0,
        }
    }
}

/// The complete record of one successful pipeline execution.
///
/// Built only after every stage succeeded and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    pub industry_context: IndustryContext,
    pub influent: ParameterSet,
    pub stages: Vec<StageResult>,
    pub created_at: DateTime<Utc>,
}

impl SimulationRun {
    /// Output of the last stage.
    #[must_use]
    pub fn effluent(&self) -> Option<&ParameterSet> {
        self.stages.last().map(|s| &s.after)
    }

    /// Result of a given stage, if it ran.
    #[must_use]
    pub fn stage(&self, stage: TreatmentStage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// A persisted run as returned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: RunId,
    pub owner: OwnerId,
    pub run: SimulationRun,
}

// =============================================================================
// TESTS
// =============================================================================
