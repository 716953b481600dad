//! Integration tests for the HTTP prediction client.
//!
//! Each test starts a small axum stub on an ephemeral port that plays the
//! prediction service.

#![allow(clippy::unwrap_used, clippy::panic)]

use aqualoop::PredictionClient;
use aqualoop_core::{
    ExecutionError, GradeService, Grader, GradingError, IndustryContext, InMemoryRunStore,
    Parameter, ParameterSet, PredictionService, QualityMetric, QualitySample, SimulationError,
    Simulator, StageCatalog, StageRequest, TreatmentStage, WaterGrade,
};
use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::time::Duration;

const STAGE_PATH: &str = "/treatment/predict-stage";
const GRADE_PATH: &str = "/predict";

/// Serve `router` on 127.0.0.1 and return its base URL.
async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Halves every numeric field and echoes the stage it was asked for.
async fn halving(Json(body): Json<Value>) -> Json<Value> {
    let mut out = serde_json::Map::new();
    for p in Parameter::ALL {
        let v = body[p.key()].as_f64().unwrap_or(f64::NAN);
        out.insert(p.key().to_string(), json!(v / 2.0));
    }
    out.insert("stage_seen".to_string(), body["treatment_stage"].clone());
    out.insert("industry_seen".to_string(), body["industry_type"].clone());
    Json(Value::Object(out))
}

fn sample() -> ParameterSet {
    Parameter::ALL.into_iter().map(|p| (p, 100.0)).collect()
}

fn request(stage: TreatmentStage) -> StageRequest {
    StageRequest::new(sample(), stage, &IndustryContext::new("textile"))
}

fn client(base_url: &str, timeout: Duration) -> PredictionClient {
    PredictionClient::new(base_url, STAGE_PATH, timeout).unwrap()
}

#[tokio::test]
async fn posts_flat_body_and_returns_raw_json() {
    let base = spawn_stub(Router::new().route(STAGE_PATH, post(halving))).await;
    let client = client(&base, Duration::from_secs(5));

    let body = client
        .predict_stage(&request(TreatmentStage::Tertiary))
        .await
        .unwrap();

    assert_eq!(body["bod"], json!(50.0));
    assert_eq!(body["stage_seen"], json!("tertiary"));
    assert_eq!(body["industry_seen"], json!("textile"));
}

#[tokio::test]
async fn full_pipeline_over_http() {
    let base = spawn_stub(Router::new().route(STAGE_PATH, post(halving))).await;
    let simulator = Simulator::new(
        StageCatalog::standard(),
        client(&base, Duration::from_secs(5)),
        InMemoryRunStore::new(),
    );

    let run = simulator
        .run_simulation(&IndustryContext::new("textile"), &sample())
        .await
        .unwrap();

    assert_eq!(run.effluent().unwrap().get(Parameter::Tss), Some(12.5));
    // Extra response keys are dropped from the stage output.
    assert_eq!(run.stages[0].after.len(), Parameter::ALL.len());
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let router = Router::new().route(
        STAGE_PATH,
        post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "bad industry") }),
    );
    let base = spawn_stub(router).await;

    let err = client(&base, Duration::from_secs(5))
        .predict_stage(&request(TreatmentStage::Primary))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExecutionError::Status {
            status: 422,
            body: "bad industry".to_string()
        }
    );
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let router = Router::new().route(STAGE_PATH, post(|| async { "not json" }));
    let base = spawn_stub(router).await;

    let err = client(&base, Duration::from_secs(5))
        .predict_stage(&request(TreatmentStage::Primary))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Malformed(_)));
}

#[tokio::test]
async fn slow_service_times_out() {
    let router = Router::new().route(
        STAGE_PATH,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({}))
        }),
    );
    let base = spawn_stub(router).await;

    let err = client(&base, Duration::from_millis(100))
        .predict_stage(&request(TreatmentStage::Secondary))
        .await
        .unwrap_err();

    assert_eq!(err, ExecutionError::TimedOut);
}

#[tokio::test]
async fn unreachable_service_fails_first_stage() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let simulator = Simulator::new(
        StageCatalog::standard(),
        client(&format!("http://{addr}"), Duration::from_secs(2)),
        InMemoryRunStore::new(),
    );
    let err = simulator
        .run_simulation(&IndustryContext::new("food"), &sample())
        .await
        .unwrap_err();

    match err {
        SimulationError::Execution {
            stage,
            index,
            source: ExecutionError::Unreachable(_),
        } => {
            assert_eq!(stage, TreatmentStage::Primary);
            assert_eq!(index, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// GRADING
// =============================================================================

/// Grades by turbidity alone and echoes the sulfate it received.
async fn grading(Json(body): Json<Value>) -> Json<Value> {
    let turbidity = body["turbidity"].as_f64().unwrap_or(f64::INFINITY);
    let grade = if turbidity < 5.0 { "B" } else { "UNSAFE" };
    Json(json!({
        "status": "success",
        "predicted_grade": grade,
        "reuse_decision": {
            "reuse_allowed": grade != "UNSAFE",
            "applications": ["Gardening", "Construction"],
            "message": "graded"
        },
        "sulfate_seen": body["sulfate"].clone(),
        "keys_seen": body.as_object().map(|o| o.len()).unwrap_or(0)
    }))
}

#[tokio::test]
async fn grade_posts_flat_sample_to_predict() {
    let base = spawn_stub(Router::new().route(GRADE_PATH, post(grading))).await;
    let client = client(&base, Duration::from_secs(5));

    let body = client
        .predict_grade(&QualitySample::baseline().with(QualityMetric::Sulfate, 333.0))
        .await
        .unwrap();

    assert_eq!(body["sulfate_seen"], json!(333.0));
    assert_eq!(body["keys_seen"], json!(QualityMetric::ALL.len()));
}

#[tokio::test]
async fn grader_over_http() {
    let base = spawn_stub(Router::new().route(GRADE_PATH, post(grading))).await;
    let grader = Grader::new(client(&base, Duration::from_secs(5)));

    let clear = grader.assess(&QualitySample::baseline()).await.unwrap();
    assert_eq!(clear.grade, WaterGrade::B);
    assert!(clear.reuse_allowed);
    assert_eq!(clear.applications, vec!["Gardening", "Construction"]);

    let murky = QualitySample::baseline().with(QualityMetric::Turbidity, 9.0);
    let murky = grader.assess(&murky).await.unwrap();
    assert_eq!(murky.grade, WaterGrade::Unsafe);
    assert!(!murky.reuse_allowed);
}

#[tokio::test]
async fn grade_error_status_is_reported() {
    let router = Router::new().route(
        GRADE_PATH,
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model missing") }),
    );
    let base = spawn_stub(router).await;
    let grader = Grader::new(client(&base, Duration::from_secs(5)));

    let err = grader.assess(&QualitySample::baseline()).await.unwrap_err();

    assert_eq!(
        err,
        GradingError::Service(ExecutionError::Status {
            status: 500,
            body: "model missing".to_string()
        })
    );
}

#[tokio::test]
async fn grade_without_required_fields_is_rejected() {
    let router = Router::new().route(
        GRADE_PATH,
        post(|| async { Json(json!({"status": "success", "reuse_allowed": true})) }),
    );
    let base = spawn_stub(router).await;
    let grader = Grader::new(client(&base, Duration::from_secs(5)));

    let err = grader.assess(&QualitySample::baseline()).await.unwrap_err();

    assert_eq!(err, GradingError::MissingField("predicted_grade"));
}

#[tokio::test]
async fn grade_service_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let grader = Grader::new(client(&format!("http://{addr}"), Duration::from_secs(2)));
    let err = grader.assess(&QualitySample::baseline()).await.unwrap_err();

    assert!(matches!(
        err,
        GradingError::Service(ExecutionError::Unreachable(_))
    ));
}
