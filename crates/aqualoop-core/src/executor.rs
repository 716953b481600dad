//! # Stage Executor
//!
//! Applies one treatment stage to a parameter set by asking the prediction
//! service. The executor shapes the request and validates the response; the
//! computation itself happens behind [`PredictionService`].
//!
//! No retries happen here. A failed call is reported as-is.

use crate::error::ExecutionError;
use crate::types::{IndustryContext, ParameterSet, TreatmentStage};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

// =============================================================================
// REQUEST
// =============================================================================

/// Body of a stage prediction request.
///
/// Serializes as the flat object
/// `{ bod, cod, ph, turbidity, tss, industry_type, treatment_stage }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRequest {
    #[serde(flatten)]
    pub parameters: ParameterSet,
    pub industry_type: String,
    pub treatment_stage: TreatmentStage,
}

impl StageRequest {
    #[must_use]
    pub fn new(parameters: ParameterSet, stage: TreatmentStage, context: &IndustryContext) -> Self {
        Self {
            parameters,
            industry_type: context.industry_type().to_string(),
            treatment_stage: stage,
        }
    }
}

// =============================================================================
// PREDICTION SERVICE
// =============================================================================

/// The remote inference service that computes a stage's output.
///
/// Implementations return the raw response body; non-success statuses,
/// transport failures and timeouts map onto [`ExecutionError`].
#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict_stage(
        &self,
        request: &StageRequest,
    ) -> Result<serde_json::Value, ExecutionError>;
}

#[async_trait]
impl<T: PredictionService + ?Sized> PredictionService for Arc<T> {
    async fn predict_stage(
        &self,
        request: &StageRequest,
    ) -> Result<serde_json::Value, ExecutionError> {
        (**self).predict_stage(request).await
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Runs single stages against a prediction service.
#[derive(Debug, Clone)]
pub struct StageExecutor<P> {
    service: P,
}

impl<P: PredictionService> StageExecutor<P> {
    #[must_use]
    pub fn new(service: P) -> Self {
        Self { service }
    }

    /// The underlying prediction service.
    #[must_use]
    pub fn service(&self) -> &P {
        &self.service
    }

    /// Apply `stage` to `parameters`.
    ///
    /// The returned set holds exactly the full parameter key set.
    pub async fn execute(
        &self,
        parameters: &ParameterSet,
        stage: TreatmentStage,
        context: &IndustryContext,
    ) -> Result<ParameterSet, ExecutionError> {
        let request = StageRequest::new(parameters.clone(), stage, context);
        tracing::debug!(
            stage = %stage,
            industry = context.industry_type(),
            "requesting stage prediction"
        );
        let body = self.service.predict_stage(&request).await?;
        ParameterSet::from_prediction(&body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::Parameter;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl PredictionService for Echo {
        async fn predict_stage(
            &self,
            request: &StageRequest,
        ) -> Result<serde_json::Value, ExecutionError> {
            Ok(serde_json::to_value(&request.parameters).unwrap())
        }
    }

    struct Fixed(serde_json::Value);

    #[async_trait]
    impl PredictionService for Fixed {
        async fn predict_stage(
            &self,
            _request: &StageRequest,
        ) -> Result<serde_json::Value, ExecutionError> {
            Ok(self.0.clone())
        }
    }

    fn sample() -> ParameterSet {
        Parameter::ALL.into_iter().map(|p| (p, 10.0)).collect()
    }

    #[test]
    fn request_serializes_flat() {
        let ctx = IndustryContext::new("textile");
        let request = StageRequest::new(sample(), TreatmentStage::Secondary, &ctx);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["bod"], json!(10.0));
        assert_eq!(value["tss"], json!(10.0));
        assert_eq!(value["industry_type"], json!("textile"));
        assert_eq!(value["treatment_stage"], json!("secondary"));
    }

    #[tokio::test]
    async fn echo_returns_input() {
        let executor = StageExecutor::new(Echo);
        let ctx = IndustryContext::new("food");
        let after = executor
            .execute(&sample(), TreatmentStage::Primary, &ctx)
            .await
            .unwrap();
        assert_eq!(after, sample());
    }

    #[tokio::test]
    async fn incomplete_response_is_an_execution_failure() {
        let executor = StageExecutor::new(Fixed(json!({"bod": 1.0})));
        let ctx = IndustryContext::new("food");
        let err = executor
            .execute(&sample(), TreatmentStage::Primary, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::MissingParameter(Parameter::Cod));
    }

    #[tokio::test]
    async fn arc_dyn_service_delegates() {
        let service: Arc<dyn PredictionService> = Arc::new(Echo);
        let executor = StageExecutor::new(service);
        let ctx = IndustryContext::new("chemical");
        let after = executor
            .execute(&sample(), TreatmentStage::Tertiary, &ctx)
            .await
            .unwrap();
        assert!(after.is_complete());
    }
}
