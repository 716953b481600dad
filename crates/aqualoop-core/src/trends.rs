//! # Trend Summaries
//!
//! Per-run series over an owner's history, one point per run in creation
//! order:
//!
//! | series | stage | parameter |
//! |--------|-------|-----------|
//! | `primary_turbidity` | primary | turbidity |
//! | `secondary_bod` | secondary | bod |
//! | `tertiary_tss` | tertiary | tss |
//!
//! plus an effluent index: the rounded mean of final bod, cod, tss and
//! turbidity. Runs lacking the stage or parameter are skipped for that series.

use crate::types::{Parameter, SimulationRun, TreatmentStage};
use serde::{Deserialize, Serialize};

/// Parameters averaged into the effluent index.
const INDEX_PARAMETERS: [Parameter; 4] = [
    Parameter::Bod,
    Parameter::Cod,
    Parameter::Tss,
    Parameter::Turbidity,
];

/// Inlet and outlet of one stage in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagePoint {
    /// 1-based position of the run in the history.
    pub run: usize,
    pub before: f64,
    pub after: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub run: usize,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendSummary {
    pub primary_turbidity: Vec<StagePoint>,
    pub secondary_bod: Vec<StagePoint>,
    pub tertiary_tss: Vec<StagePoint>,
    pub effluent_index: Vec<IndexPoint>,
}

impl TrendSummary {
    /// Build the summary from runs already in creation order.
    #[must_use]
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a SimulationRun>) -> Self {
        let mut summary = Self::default();

        for (i, run) in runs.into_iter().enumerate() {
            let n = i + 1;
            if let Some(p) = stage_point(run, n, TreatmentStage::Primary, Parameter::Turbidity) {
                summary.primary_turbidity.push(p);
            }
            if let Some(p) = stage_point(run, n, TreatmentStage::Secondary, Parameter::Bod) {
                summary.secondary_bod.push(p);
            }
            if let Some(p) = stage_point(run, n, TreatmentStage::Tertiary, Parameter::Tss) {
                summary.tertiary_tss.push(p);
            }
            if let Some(value) = effluent_index(run) {
                summary.effluent_index.push(IndexPoint { run: n, value });
            }
        }

        summary
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effluent_index.is_empty()
            && self.primary_turbidity.is_empty()
            && self.secondary_bod.is_empty()
            && self.tertiary_tss.is_empty()
    }
}

fn stage_point(
    run: &SimulationRun,
    n: usize,
    stage: TreatmentStage,
    parameter: Parameter,
) -> Option<StagePoint> {
    let result = run.stage(stage)?;
    Some(StagePoint {
        run: n,
        before: result.before.get(parameter)?,
        after: result.after.get(parameter)?,
    })
}

/// Rounded mean of the final bod, cod, tss and turbidity.
#[must_use]
pub fn effluent_index(run: &SimulationRun) -> Option<i64> {
    let effluent = run.effluent()?;
    let mut sum = 0.0;
    for parameter in INDEX_PARAMETERS {
        sum += effluent.get(parameter)?;
    }
    Some((sum / INDEX_PARAMETERS.len() as f64).round() as i64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{IndustryContext, ParameterSet, StageResult};
    use chrono::Utc;

    fn set(v: f64) -> ParameterSet {
        Parameter::ALL.into_iter().map(|p| (p, v)).collect()
    }

    fn run(values: [f64; 4]) -> SimulationRun {
        let stages = [
            TreatmentStage::Primary,
            TreatmentStage::Secondary,
            TreatmentStage::Tertiary,
        ]
        .into_iter()
        .enumerate()
        .map(|(i, stage)| StageResult {
            stage,
            before: set(values[i]),
            after: set(values[i + 1]),
        })
        .collect();

        SimulationRun {
            industry_context: IndustryContext::new("textile"),
            influent: set(values[0]),
            stages,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn one_point_per_run_and_series() {
        let runs = vec![run([100.0, 80.0, 40.0, 10.0]), run([50.0, 40.0, 20.0, 5.0])];
        let summary = TrendSummary::from_runs(&runs);

        assert_eq!(summary.primary_turbidity.len(), 2);
        assert_eq!(
            summary.secondary_bod[0],
            StagePoint {
                run: 1,
                before: 80.0,
                after: 40.0
            }
        );
        assert_eq!(summary.tertiary_tss[1].after, 5.0);
        assert_eq!(
            summary.effluent_index,
            vec![IndexPoint { run: 1, value: 10 }, IndexPoint { run: 2, value: 5 }]
        );
    }

    #[test]
    fn index_rounds_mean() {
        let mut r = run([1.0, 1.0, 1.0, 1.0]);
        let last = r.stages.last_mut().unwrap();
        last.after = set(0.0)
            .with(Parameter::Bod, 10.0)
            .with(Parameter::Cod, 11.0)
            .with(Parameter::Tss, 0.0)
            .with(Parameter::Turbidity, 0.0);
        // (10 + 11 + 0 + 0) / 4 = 5.25
        assert_eq!(effluent_index(&r), Some(5));
    }

    #[test]
    fn runs_without_stages_are_skipped() {
        let mut r = run([1.0, 1.0, 1.0, 1.0]);
        r.stages.clear();
        let summary = TrendSummary::from_runs([&r]);
        assert!(summary.is_empty());
    }
}
