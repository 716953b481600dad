//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{InfluentArgs, SampleArgs};
use crate::api::{self, GradeResponse, SimulateResponse};
use crate::client::PredictionClient;
use crate::config::{Config, StorageBackend, StorageConfig};
use crate::error::AppError;
use aqualoop_core::{
    Grader, InMemoryRunStore, IndustryContext, OwnerId, PROFILES, Parameter, ParameterSet,
    QualityMetric, QualitySample, RedbRunStore, RunStore, SimulationRun, Simulator,
    StageCatalog, StoredRun, TrendSummary, effluent_index, profile,
};
use std::fmt::Write as _;
use std::sync::Arc;

// =============================================================================
// STORAGE
// =============================================================================

/// Open the configured run store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn RunStore>, AppError> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory run store; runs are lost on exit");
            Ok(Arc::new(InMemoryRunStore::new()))
        }
        StorageBackend::Redb => {
            let store = RedbRunStore::open(&config.path)?;
            tracing::info!(path = %config.path.display(), "opened redb run store");
            Ok(Arc::new(store))
        }
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), AppError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("AquaLoop Simulation Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:    {}", config.server.addr());
    println!("  Predictor:  {}{}", config.prediction.base_url, config.prediction.stage_path);
    println!("  Backend:    {:?}", config.storage.backend);
    println!("  Database:   {}", config.storage.path.display());
    println!();
    println!("Endpoints:");
    println!("  POST /simulate             - Run a simulation");
    println!("  GET  /simulations          - Stored runs (X-Owner-Id)");
    println!("  GET  /trends               - Trend summary (X-Owner-Id)");
    println!("  POST /grade                - Grade a water sample");
    println!("  POST /submissions          - Enqueue a simulation");
    println!("  GET  /submissions/pending  - In-flight submissions");
    println!("  GET  /profiles             - Industry profiles");
    println!("  GET  /health               - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config).await
}

// =============================================================================
// SIMULATE COMMAND
// =============================================================================

/// Arguments of the `simulate` command.
#[derive(Debug, Clone, Default)]
pub struct SimulateArgs {
    pub industry: Option<String>,
    pub profile: Option<String>,
    pub manual_name: Option<String>,
    pub influent: InfluentArgs,
    pub owner: Option<String>,
}

impl SimulateArgs {
    /// Industry context and influent: profile defaults first, explicit
    /// values on top. Completeness is checked by the simulator.
    pub fn resolve(&self) -> Result<(IndustryContext, ParameterSet), AppError> {
        let base = match &self.profile {
            Some(key) => {
                Some(profile(key).ok_or_else(|| AppError::UnknownProfile(key.clone()))?)
            }
            None => None,
        };

        let industry = self
            .industry
            .clone()
            .or_else(|| base.map(|p| p.key.to_string()))
            .unwrap_or_default();
        let mut context = IndustryContext::new(industry);
        if let Some(name) = &self.manual_name {
            context = context.with_manual_name(name.as_str());
        }

        let mut influent = base.map(|p| p.influent()).unwrap_or_default();
        let explicit = [
            (Parameter::Bod, self.influent.bod),
            (Parameter::Cod, self.influent.cod),
            (Parameter::Ph, self.influent.ph),
            (Parameter::Turbidity, self.influent.turbidity),
            (Parameter::Tss, self.influent.tss),
        ];
        for (parameter, value) in explicit {
            if let Some(v) = value {
                influent.insert(parameter, v);
            }
        }

        Ok((context, influent))
    }

    fn owner(&self) -> Option<OwnerId> {
        self.owner
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(OwnerId::new)
    }
}

/// Run one simulation against the configured predictor.
pub async fn cmd_simulate(
    config: &Config,
    args: &SimulateArgs,
    json_mode: bool,
) -> Result<(), AppError> {
    let (context, influent) = args.resolve()?;
    let client = PredictionClient::from_config(&config.prediction)?;
    let store = open_store(&config.storage)?;
    let simulator = Simulator::new(StageCatalog::standard(), client, store);

    let owner = args.owner();
    let outcome = simulator
        .simulate_and_record(&context, &influent, owner.as_ref())
        .await?;

    if json_mode {
        let output = SimulateResponse::from(outcome);
        println!("{}", to_json(&output)?);
        return Ok(());
    }

    print!("{}", render_run(&outcome.run));
    match outcome.persistence.run_id() {
        Some(id) => println!("Saved as run #{id}"),
        None => {
            if let Some(warning) = outcome.persistence.warning() {
                println!("Warning: {warning}");
            }
        }
    }
    Ok(())
}

/// Stage-by-stage table of a run.
pub fn render_run(run: &SimulationRun) -> String {
    let mut out = String::new();
    let ctx = &run.industry_context;
    if ctx.display_name() == ctx.industry_type() {
        let _ = writeln!(out, "Industry: {}", ctx.industry_type());
    } else {
        let _ = writeln!(out, "Industry: {} ({})", ctx.industry_type(), ctx.display_name());
    }
    let _ = writeln!(out, "Created:  {}", run.created_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<22} {:<10} {:>10} {:>10} {:>8}",
        "Stage", "Parameter", "Before", "After", "Removed"
    );

    for result in &run.stages {
        for parameter in Parameter::ALL {
            let (Some(before), Some(after)) =
                (result.before.get(parameter), result.after.get(parameter))
            else {
                continue;
            };
            let _ = writeln!(
                out,
                "{:<22} {:<10} {:>10.2} {:>10.2} {:>7.1}%",
                result.stage.label(),
                parameter.key(),
                before,
                after,
                result.reduction_percent(parameter)
            );
        }
    }

    if let Some(index) = effluent_index(run) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Effluent index: {index}");
    }
    out
}

// =============================================================================
// HISTORY & TRENDS COMMANDS
// =============================================================================

fn load_history(config: &Config, owner: &str) -> Result<Vec<StoredRun>, AppError> {
    let store = open_store(&config.storage)?;
    Ok(store.list(&OwnerId::new(owner))?)
}

/// List stored runs of an owner.
pub fn cmd_history(config: &Config, owner: &str, json_mode: bool) -> Result<(), AppError> {
    let runs = load_history(config, owner)?;

    if json_mode {
        println!("{}", to_json(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No runs stored for {owner}");
        return Ok(());
    }
    println!("{:>6}  {:<25} {:<20} {:>8}", "Run", "Created", "Industry", "Index");
    for stored in &runs {
        let index = effluent_index(&stored.run).map_or_else(|| "-".to_string(), |i| i.to_string());
        println!(
            "{:>6}  {:<25} {:<20} {:>8}",
            stored.id.0,
            stored.run.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            stored.run.industry_context.display_name(),
            index
        );
    }
    Ok(())
}

/// Show the trend summary over an owner's runs.
pub fn cmd_trends(config: &Config, owner: &str, json_mode: bool) -> Result<(), AppError> {
    let runs = load_history(config, owner)?;
    let summary = TrendSummary::from_runs(runs.iter().map(|r| &r.run));

    if json_mode {
        println!("{}", to_json(&summary)?);
        return Ok(());
    }

    if summary.is_empty() {
        println!("No runs stored for {owner}");
        return Ok(());
    }

    let series = [
        ("Primary turbidity", &summary.primary_turbidity),
        ("Secondary BOD", &summary.secondary_bod),
        ("Tertiary TSS", &summary.tertiary_tss),
    ];
    for (title, points) in series {
        println!("{title}:");
        for p in points {
            println!("  run {:>3}: {:>10.2} -> {:>10.2}", p.run, p.before, p.after);
        }
    }
    println!("Effluent index:");
    for p in &summary.effluent_index {
        println!("  run {:>3}: {:>10}", p.run, p.value);
    }
    Ok(())
}

// =============================================================================
// GRADE COMMAND
// =============================================================================

impl SampleArgs {
    /// Baseline sample with the explicit values on top.
    pub fn resolve(&self) -> QualitySample {
        let explicit = [
            (QualityMetric::Ph, self.ph),
            (QualityMetric::Hardness, self.hardness),
            (QualityMetric::Solids, self.solids),
            (QualityMetric::Chloramines, self.chloramines),
            (QualityMetric::Sulfate, self.sulfate),
            (QualityMetric::Conductivity, self.conductivity),
            (QualityMetric::OrganicCarbon, self.organic_carbon),
            (QualityMetric::Trihalomethanes, self.trihalomethanes),
            (QualityMetric::Turbidity, self.turbidity),
        ];
        let mut sample = QualitySample::baseline();
        for (metric, value) in explicit {
            if let Some(v) = value {
                sample.insert(metric, v);
            }
        }
        sample
    }
}

/// Grade one water sample against the configured classifier.
pub async fn cmd_grade(
    config: &Config,
    args: &SampleArgs,
    json_mode: bool,
) -> Result<(), AppError> {
    let sample = args.resolve();
    let grader = Grader::new(PredictionClient::from_config(&config.prediction)?);
    let response = GradeResponse::from(grader.assess(&sample).await?);

    if json_mode {
        println!("{}", to_json(&response)?);
        return Ok(());
    }

    print!("{}", render_grade(&sample, &response));
    Ok(())
}

/// Sample table followed by the grade and reuse decision.
pub fn render_grade(sample: &QualitySample, response: &GradeResponse) -> String {
    let mut out = String::new();
    for (metric, value) in sample.iter() {
        let _ = writeln!(out, "{:<16} {:>10.2} {}", metric.key(), value, metric.unit());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Grade: {} ({})", response.grade, response.label);
    let verdict = if response.reuse_allowed { "allowed" } else { "not allowed" };
    let _ = writeln!(out, "Reuse: {verdict}");
    let _ = writeln!(out, "Uses:  {}", response.uses.join(", "));
    if !response.applications.is_empty() {
        let _ = writeln!(out, "Applications: {}", response.applications.join(", "));
    }
    if let Some(message) = &response.message {
        let _ = writeln!(out, "{message}");
    }
    out
}

// =============================================================================
// PROFILES COMMAND
// =============================================================================

/// List catalogued industry profiles.
pub fn cmd_profiles(json_mode: bool) -> Result<(), AppError> {
    if json_mode {
        let profiles: Vec<api::ProfileResponse> =
            PROFILES.iter().map(api::ProfileResponse::from).collect();
        println!("{}", to_json(&profiles)?);
        return Ok(());
    }

    println!(
        "{:<10} {:<20} {:>8} {:>8} {:>6} {:>10} {:>8}",
        "Key", "Label", "BOD", "COD", "pH", "Turbidity", "TSS"
    );
    for p in &PROFILES {
        let [bod, cod, ph, turbidity, tss] = p.defaults;
        println!(
            "{:<10} {:<20} {:>8} {:>8} {:>6} {:>10} {:>8}",
            p.key, p.label, bod, cod, ph, turbidity, tss
        );
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Io(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aqualoop_core::{StageResult, TreatmentStage};

    fn empty_run() -> SimulationRun {
        SimulationRun {
            industry_context: IndustryContext::new("textile"),
            influent: ParameterSet::new(),
            stages: Vec::new(),
            created_at: Default::default(),
        }
    }

    #[test]
    fn profile_defaults_with_overrides() {
        let args = SimulateArgs {
            profile: Some("textile".to_string()),
            influent: InfluentArgs {
                ph: Some(7.0),
                ..InfluentArgs::default()
            },
            ..SimulateArgs::default()
        };
        let (context, influent) = args.resolve().unwrap();
        assert_eq!(context.industry_type(), "textile");
        assert_eq!(influent.get(Parameter::Ph), Some(7.0));
        assert_eq!(influent.get(Parameter::Bod), Some(420.0));
        assert!(influent.is_complete());
    }

    #[test]
    fn explicit_industry_wins_over_profile() {
        let args = SimulateArgs {
            industry: Some("other".to_string()),
            profile: Some("food".to_string()),
            manual_name: Some("Cannery".to_string()),
            ..SimulateArgs::default()
        };
        let (context, _) = args.resolve().unwrap();
        assert_eq!(context.industry_type(), "other");
        assert_eq!(context.display_name(), "Cannery");
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let args = SimulateArgs {
            profile: Some("mining".to_string()),
            ..SimulateArgs::default()
        };
        assert!(matches!(args.resolve(), Err(AppError::UnknownProfile(_))));
    }

    #[test]
    fn blank_owner_means_no_owner() {
        let args = SimulateArgs {
            owner: Some("  ".to_string()),
            ..SimulateArgs::default()
        };
        assert_eq!(args.owner(), None);
    }

    #[test]
    fn memory_store_opens() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let store = open_store(&config).unwrap();
        assert!(store.list(&OwnerId::new("x")).unwrap().is_empty());
    }

    #[test]
    fn redb_store_opens_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Redb,
            path: dir.path().join("runs.redb"),
        };
        open_store(&config).unwrap();
        assert!(config.path.exists());
    }

    #[test]
    fn sample_args_override_baseline() {
        let args = SampleArgs {
            sulfate: Some(410.0),
            organic_carbon: Some(18.5),
            ..SampleArgs::default()
        };
        let sample = args.resolve();
        assert!(sample.ensure_complete().is_ok());
        assert_eq!(sample.get(QualityMetric::Sulfate), Some(410.0));
        assert_eq!(sample.get(QualityMetric::OrganicCarbon), Some(18.5));
        assert_eq!(sample.get(QualityMetric::Ph), Some(7.0));
    }

    #[test]
    fn render_grade_shows_decision() {
        let response = GradeResponse::from(aqualoop_core::GradeAssessment {
            grade: aqualoop_core::WaterGrade::Unsafe,
            reuse_allowed: false,
            applications: Vec::new(),
            message: Some("Further treatment required.".to_string()),
        });
        let text = render_grade(&QualitySample::baseline(), &response);
        assert!(text.contains("Grade: UNSAFE (Hazardous)"));
        assert!(text.contains("Reuse: not allowed"));
        assert!(text.contains("organic_carbon"));
        assert!(text.contains("Further treatment required."));
    }

    #[test]
    fn render_lists_every_stage_parameter() {
        let influent = profile("textile").unwrap().influent();
        let after = influent.clone().with(Parameter::Bod, 210.0);
        let mut run = empty_run();
        run.influent = influent.clone();
        run.stages = vec![StageResult {
            stage: TreatmentStage::Primary,
            before: influent,
            after,
        }];

        let text = render_run(&run);
        assert!(text.contains("Industry: textile"));
        assert!(text.contains("Primary Treatment"));
        assert!(text.contains("50.0%"));
        assert!(text.contains("Effluent index:"));
    }
}
