//! # Quality Grading
//!
//! Grades a water sample for reuse by asking a remote classifier.
//!
//! The sample is a different measurement set from the treatment influent:
//! nine potability metrics (`QualityMetric`). The classifier answers with a
//! grade label and a reuse decision; this module validates both before
//! anything reaches the caller.
//!
//! ```text
//! QualitySample ──ensure_complete──▶ GradeService ──from_response──▶ GradeAssessment
//! ```
//!
//! How the grade is computed stays behind [`GradeService`].

use crate::error::{ExecutionError, GradingError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// METRICS
// =============================================================================

/// A potability metric sent to the grade classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    Ph,
    Hardness,
    Solids,
    Chloramines,
    Sulfate,
    Conductivity,
    OrganicCarbon,
    Trihalomethanes,
    Turbidity,
}

impl QualityMetric {
    /// Every metric, in wire order.
    pub const ALL: [QualityMetric; 9] = [
        QualityMetric::Ph,
        QualityMetric::Hardness,
        QualityMetric::Solids,
        QualityMetric::Chloramines,
        QualityMetric::Sulfate,
        QualityMetric::Conductivity,
        QualityMetric::OrganicCarbon,
        QualityMetric::Trihalomethanes,
        QualityMetric::Turbidity,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            QualityMetric::Ph => "ph",
            QualityMetric::Hardness => "hardness",
            QualityMetric::Solids => "solids",
            QualityMetric::Chloramines => "chloramines",
            QualityMetric::Sulfate => "sulfate",
            QualityMetric::Conductivity => "conductivity",
            QualityMetric::OrganicCarbon => "organic_carbon",
            QualityMetric::Trihalomethanes => "trihalomethanes",
            QualityMetric::Turbidity => "turbidity",
        }
    }

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            QualityMetric::Ph => "",
            QualityMetric::Hardness | QualityMetric::Sulfate => "mg/L",
            QualityMetric::Solids | QualityMetric::Chloramines | QualityMetric::OrganicCarbon => {
                "ppm"
            }
            QualityMetric::Conductivity => "µS/cm",
            QualityMetric::Trihalomethanes => "µg/L",
            QualityMetric::Turbidity => "NTU",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// SAMPLE
// =============================================================================

/// A water sample to grade. Serializes as a flat `{ metric: value }` object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualitySample(BTreeMap<QualityMetric, f64>);

impl QualitySample {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mid-range starting values for an analyzer form.
    #[must_use]
    pub fn baseline() -> Self {
        let values = [7.0, 200.0, 20000.0, 7.0, 300.0, 400.0, 10.0, 60.0, 4.0];
        QualityMetric::ALL.into_iter().zip(values).collect()
    }

    #[must_use]
    pub fn with(mut self, metric: QualityMetric, value: f64) -> Self {
        self.0.insert(metric, value);
        self
    }

    pub fn insert(&mut self, metric: QualityMetric, value: f64) {
        self.0.insert(metric, value);
    }

    #[must_use]
    pub fn get(&self, metric: QualityMetric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QualityMetric, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    /// Every metric present and finite; reports the first offender in wire order.
    pub fn ensure_complete(&self) -> Result<(), GradingError> {
        for metric in QualityMetric::ALL {
            match self.get(metric) {
                None => return Err(GradingError::MissingMetric(metric)),
                Some(v) if !v.is_finite() => return Err(GradingError::NonNumeric(metric)),
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Build a sample from an operator-supplied JSON object.
    ///
    /// Unknown keys (such as a batch volume) are ignored; known keys must
    /// hold JSON numbers.
    pub fn from_json_map(map: &serde_json::Map<String, Value>) -> Result<Self, GradingError> {
        let mut sample = Self::new();
        for (key, value) in map {
            let Some(metric) = QualityMetric::from_key(key) else {
                continue;
            };
            let number = value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or(GradingError::NonNumeric(metric))?;
            sample.insert(metric, number);
        }
        Ok(sample)
    }
}

impl FromIterator<(QualityMetric, f64)> for QualitySample {
    fn from_iter<I: IntoIterator<Item = (QualityMetric, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// GRADE
// =============================================================================

/// Reuse grade assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaterGrade {
    A,
    B,
    C,
    D,
    #[serde(rename = "UNSAFE")]
    Unsafe,
}

impl WaterGrade {
    /// Parse a classifier label. Case-insensitive; surrounding blanks ignored.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "A" => Some(WaterGrade::A),
            "B" => Some(WaterGrade::B),
            "C" => Some(WaterGrade::C),
            "D" => Some(WaterGrade::D),
            "UNSAFE" => Some(WaterGrade::Unsafe),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            WaterGrade::A => "A",
            WaterGrade::B => "B",
            WaterGrade::C => "C",
            WaterGrade::D => "D",
            WaterGrade::Unsafe => "UNSAFE",
        }
    }

    /// Human-readable class of the grade.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            WaterGrade::A => "Premium Potable",
            WaterGrade::B => "Standard Potable",
            WaterGrade::C => "Utility Water",
            WaterGrade::D => "Industrial Only",
            WaterGrade::Unsafe => "Hazardous",
        }
    }

    /// Typical uses of water at this grade.
    #[must_use]
    pub const fn uses(self) -> &'static [&'static str] {
        match self {
            WaterGrade::A => &["Drinking", "Food Prep", "Medical"],
            WaterGrade::B => &["Cooking", "Bathing", "Laundry"],
            WaterGrade::C => &["Irrigation", "Car Wash", "Toilets"],
            WaterGrade::D => &["Cooling", "Fire Control"],
            WaterGrade::Unsafe => &["No Contact", "Treat First"],
        }
    }
}

impl fmt::Display for WaterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// ASSESSMENT
// =============================================================================

/// A validated classifier answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeAssessment {
    pub grade: WaterGrade,
    pub reuse_allowed: bool,
    /// Reuse applications suggested by the classifier, if any.
    #[serde(default)]
    pub applications: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GradeAssessment {
    /// Validate a classifier response body.
    ///
    /// `predicted_grade` and `reuse_allowed` are required. The reuse flag
    /// may sit at the top level or inside a `reuse_decision` object, which
    /// may also carry `applications` and `message`. A body with
    /// `"status": "error"` is a rejection.
    pub fn from_response(body: &Value) -> Result<Self, GradingError> {
        let object = body.as_object().ok_or_else(|| {
            GradingError::Service(ExecutionError::Malformed(
                "expected a JSON object".to_string(),
            ))
        })?;

        if object.get("status").and_then(Value::as_str) == Some("error") {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("classifier reported an error");
            return Err(GradingError::Rejected(message.to_string()));
        }

        let label = object
            .get("predicted_grade")
            .ok_or(GradingError::MissingField("predicted_grade"))?;
        let grade = label
            .as_str()
            .and_then(WaterGrade::from_label)
            .ok_or_else(|| GradingError::UnknownGrade(label.to_string()))?;

        let decision = object.get("reuse_decision").and_then(Value::as_object);
        let reuse_allowed = object
            .get("reuse_allowed")
            .or_else(|| decision.and_then(|d| d.get("reuse_allowed")))
            .ok_or(GradingError::MissingField("reuse_allowed"))?
            .as_bool()
            .ok_or_else(|| {
                GradingError::Service(ExecutionError::Malformed(
                    "reuse_allowed is not a boolean".to_string(),
                ))
            })?;

        let applications = decision
            .and_then(|d| d.get("applications"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let message = decision
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            grade,
            reuse_allowed,
            applications,
            message,
        })
    }
}

// =============================================================================
// GRADE SERVICE
// =============================================================================

/// The remote grade classifier.
///
/// Implementations return the raw response body; transport failures map
/// onto [`ExecutionError`].
#[async_trait]
pub trait GradeService: Send + Sync {
    async fn predict_grade(&self, sample: &QualitySample) -> Result<Value, ExecutionError>;
}

#[async_trait]
impl<T: GradeService + ?Sized> GradeService for Arc<T> {
    async fn predict_grade(&self, sample: &QualitySample) -> Result<Value, ExecutionError> {
        (**self).predict_grade(sample).await
    }
}

// =============================================================================
// GRADER
// =============================================================================

/// Validates samples and classifier answers around a [`GradeService`].
#[derive(Debug, Clone)]
pub struct Grader<G> {
    service: G,
}

impl<G: GradeService> Grader<G> {
    #[must_use]
    pub fn new(service: G) -> Self {
        Self { service }
    }

    /// Grade `sample`. An incomplete sample never reaches the service.
    pub async fn assess(&self, sample: &QualitySample) -> Result<GradeAssessment, GradingError> {
        if let Err(e) = sample.ensure_complete() {
            tracing::warn!(error = %e, "grade request rejected");
            return Err(e);
        }

        let body = self.service.predict_grade(sample).await?;
        let assessment = GradeAssessment::from_response(&body).inspect_err(|e| {
            tracing::error!(error = %e, "unusable grade response");
        })?;

        tracing::info!(
            grade = %assessment.grade,
            reuse_allowed = assessment.reuse_allowed,
            "sample graded"
        );
        Ok(assessment)
    }
}
