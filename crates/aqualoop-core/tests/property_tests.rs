//! # Property-Based Tests
//!
//! Threading, validation and all-or-nothing invariants of the simulation
//! pipeline, checked over generated influent samples.

use aqualoop_core::{
    ExecutionError, InMemoryRunStore, IndustryContext, OwnerId, Parameter, ParameterSet,
    PredictionService, SimulationError, Simulator, StageCatalog, StageRequest, StageResult,
    TreatmentStage, TrendSummary, async_trait,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// HELPERS
// =============================================================================

/// Scales every parameter by a per-stage factor, failing on one call.
struct Scripted {
    factors: [f64; 3],
    fail_at: Option<usize>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(factors: [f64; 3], fail_at: Option<usize>) -> Self {
        Self {
            factors,
            fail_at,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PredictionService for Scripted {
    async fn predict_stage(
        &self,
        request: &StageRequest,
    ) -> Result<serde_json::Value, ExecutionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(n) {
            return Err(ExecutionError::TimedOut);
        }
        let factor = self.factors[n % self.factors.len()];
        let out: ParameterSet = request
            .parameters
            .iter()
            .map(|(p, v)| (p, v * factor))
            .collect();
        serde_json::to_value(out).map_err(|e| ExecutionError::Malformed(e.to_string()))
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn influent_strategy() -> impl Strategy<Value = ParameterSet> {
    proptest::array::uniform5(0.0f64..5000.0)
        .prop_map(|values| Parameter::ALL.into_iter().zip(values).collect())
}

fn factors_strategy() -> impl Strategy<Value = [f64; 3]> {
    proptest::array::uniform3(0.0f64..1.0)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Stage i's input is exactly stage i-1's output; the first stage sees the influent.
    #[test]
    fn outputs_thread_into_inputs(
        influent in influent_strategy(),
        factors in factors_strategy(),
    ) {
        let simulator = Simulator::new(
            StageCatalog::standard(),
            Scripted::new(factors, None),
            InMemoryRunStore::new(),
        );
        let run = block_on(simulator.run_simulation(&IndustryContext::new("textile"), &influent))
            .expect("run");

        prop_assert_eq!(run.stages.len(), simulator.catalog().len());
        prop_assert_eq!(&run.stages[0].before, &influent);
        for pair in run.stages.windows(2) {
            prop_assert_eq!(&pair[1].before, &pair[0].after);
        }
        for result in &run.stages {
            prop_assert!(result.after.is_complete());
        }
    }

    /// An identity predictor leaves the influent unchanged.
    #[test]
    fn identity_is_a_fixed_point(influent in influent_strategy()) {
        let simulator = Simulator::new(
            StageCatalog::standard(),
            Scripted::new([1.0; 3], None),
            InMemoryRunStore::new(),
        );
        let run = block_on(simulator.run_simulation(&IndustryContext::new("food"), &influent))
            .expect("run");

        prop_assert_eq!(run.effluent(), Some(&influent));
    }

    /// Any missing parameter is rejected before the first prediction call.
    #[test]
    fn incomplete_influent_never_reaches_predictor(
        influent in influent_strategy(),
        missing in 0usize..5,
    ) {
        let dropped = Parameter::ALL[missing];
        let partial: ParameterSet = influent.iter().filter(|(p, _)| *p != dropped).collect();

        let predictor = Arc::new(Scripted::new([0.5; 3], None));
        let simulator = Simulator::new(
            StageCatalog::standard(),
            predictor.clone(),
            InMemoryRunStore::new(),
        );
        let err = block_on(simulator.run_simulation(&IndustryContext::new("chemical"), &partial))
            .expect_err("validation");

        prop_assert!(err.is_validation());
        prop_assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    /// A failure at stage k persists nothing and names stage k.
    #[test]
    fn failed_stage_persists_nothing(
        influent in influent_strategy(),
        k in 0usize..3,
    ) {
        let store = Arc::new(InMemoryRunStore::new());
        let simulator = Simulator::new(
            StageCatalog::standard(),
            Scripted::new([0.7; 3], Some(k)),
            store.clone(),
        );
        let owner = OwnerId::new("plant-7");
        let err = block_on(simulator.simulate_and_record(
            &IndustryContext::new("municipal"),
            &influent,
            Some(&owner),
        ))
        .expect_err("execution");

        let is_expected = matches!(
            err,
            SimulationError::Execution { index, source: ExecutionError::TimedOut, .. } if index == k
        );
        prop_assert!(is_expected);
        prop_assert_eq!(err.failed_stage(), Some(StageCatalog::standard().stages()[k]));
        prop_assert!(store.is_empty().expect("len"));
    }

    /// Reduction percentages stay within 0..=100.
    #[test]
    fn reduction_percent_is_bounded(
        before in influent_strategy(),
        after in influent_strategy(),
    ) {
        let result = StageResult { stage: TreatmentStage::Secondary, before, after };
        for p in Parameter::ALL {
            let r = result.reduction_percent(p);
            prop_assert!((0.0..=100.0).contains(&r));
        }
    }

    /// Trend series hold one point per completed run.
    #[test]
    fn trends_have_one_point_per_run(
        samples in proptest::collection::vec(influent_strategy(), 1..8),
    ) {
        let simulator = Simulator::new(
            StageCatalog::standard(),
            Scripted::new([0.9; 3], None),
            InMemoryRunStore::new(),
        );
        let ctx = IndustryContext::new("textile");
        let runs: Vec<_> = samples
            .iter()
            .map(|s| block_on(simulator.run_simulation(&ctx, s)).expect("run"))
            .collect();

        let summary = TrendSummary::from_runs(&runs);
        prop_assert_eq!(summary.primary_turbidity.len(), runs.len());
        prop_assert_eq!(summary.secondary_bod.len(), runs.len());
        prop_assert_eq!(summary.tertiary_tss.len(), runs.len());
        prop_assert_eq!(summary.effluent_index.len(), runs.len());
    }
}
