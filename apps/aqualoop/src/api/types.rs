//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use aqualoop_core::{
    GradeAssessment, IndustryContext, IndustryProfile, ParameterSet, RunId, SimulationError,
    SimulationOutcome, SimulationRun, StoredRun, TreatmentStage, ValidationError, WaterGrade,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// PROFILES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub key: String,
    pub label: String,
    pub influent: ParameterSet,
}

impl From<&IndustryProfile> for ProfileResponse {
    fn from(profile: &IndustryProfile) -> Self {
        Self {
            key: profile.key.to_string(),
            label: profile.label.to_string(),
            influent: profile.influent(),
        }
    }
}

// =============================================================================
// SIMULATE REQUEST/RESPONSE
// =============================================================================

/// Simulation request body.
///
/// `influent` is kept as a raw object so that non-numeric values are
/// reported as validation failures rather than body rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateRequest {
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub manual_name: Option<String>,
    #[serde(default)]
    pub influent: serde_json::Map<String, serde_json::Value>,
}

impl SimulateRequest {
    /// Split into the industry context and influent sample.
    pub fn to_parts(&self) -> Result<(IndustryContext, ParameterSet), ValidationError> {
        let mut context = IndustryContext::new(self.industry.trim());
        if let Some(name) = &self.manual_name {
            context = context.with_manual_name(name.as_str());
        }
        let influent = ParameterSet::from_json_map(&self.influent)?;
        Ok((context, influent))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub run: SimulationRun,
    pub persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<SimulationOutcome> for SimulateResponse {
    fn from(outcome: SimulationOutcome) -> Self {
        Self {
            persisted: outcome.persistence.is_persisted(),
            run_id: outcome.persistence.run_id(),
            warning: outcome.persistence.warning(),
            run: outcome.run,
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stage that failed, for execution failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<TreatmentStage>,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            stage: None,
        }
    }
}

impl From<&SimulationError> for ErrorResponse {
    fn from(e: &SimulationError) -> Self {
        Self {
            error: e.to_string(),
            stage: e.failed_stage(),
        }
    }
}

// =============================================================================
// HISTORY & TRENDS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub owner: String,
    pub runs: Vec<StoredRun>,
}

// =============================================================================
// GRADE
// =============================================================================

/// Grade of a water sample, with the class label and typical uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeResponse {
    pub grade: WaterGrade,
    pub label: String,
    pub reuse_allowed: bool,
    pub uses: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<GradeAssessment> for GradeResponse {
    fn from(assessment: GradeAssessment) -> Self {
        Self {
            label: assessment.grade.label().to_string(),
            uses: assessment
                .grade
                .uses()
                .iter()
                .map(|u| (*u).to_string())
                .collect(),
            grade: assessment.grade,
            reuse_allowed: assessment.reuse_allowed,
            applications: assessment.applications,
            message: assessment.message,
        }
    }
}

// =============================================================================
// SUBMISSIONS
// =============================================================================

/// Asynchronous simulation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub submission_id: String,
    #[serde(flatten)]
    pub simulation: SimulateRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub submission_id: String,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResponse {
    pub fn accepted(id: impl Into<String>) -> Self {
        Self {
            submission_id: id.into(),
            accepted: true,
            error: None,
        }
    }

    pub fn rejected(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            submission_id: id.into(),
            accepted: false,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResponse {
    pub pending: Vec<String>,
}
