//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ErrorResponse, GradeResponse, HealthResponse, HistoryResponse, PendingResponse,
        ProfileResponse, SimulateRequest, SimulateResponse, SubmissionRequest,
        SubmissionResponse,
    },
};
use crate::queue::{Submission, SubmitOutcome};
use aqualoop_core::{
    OwnerId, PROFILES, QualitySample, SimulationError, StoredRun, TrendSummary, validate_request,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

/// Header carrying the authenticated owner identity.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner identity from the request, if any.
fn owner_from(headers: &HeaderMap) -> Option<OwnerId> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(OwnerId::new)
}

fn missing_owner() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(format!("missing {OWNER_HEADER} header"))),
    )
        .into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// PROFILES HANDLER
// =============================================================================

pub async fn profiles_handler() -> impl IntoResponse {
    let profiles: Vec<ProfileResponse> = PROFILES.iter().map(ProfileResponse::from).collect();
    Json(profiles)
}

// =============================================================================
// SIMULATE HANDLER
// =============================================================================

/// Run the full pipeline synchronously and persist for the caller.
pub async fn simulate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SimulateRequest>,
) -> Response {
    let (context, influent) = match request.to_parts() {
        Ok(parts) => parts,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
                .into_response();
        }
    };
    let owner = owner_from(&headers);

    match state
        .simulator
        .simulate_and_record(&context, &influent, owner.as_ref())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(SimulateResponse::from(outcome))).into_response(),
        Err(e) => {
            let status = match e {
                SimulationError::Validation(_) => StatusCode::BAD_REQUEST,
                SimulationError::Execution { .. } => StatusCode::BAD_GATEWAY,
            };
            (status, Json(ErrorResponse::from(&e))).into_response()
        }
    }
}

// =============================================================================
// HISTORY & TRENDS HANDLERS
// =============================================================================

fn load_history(state: &AppState, owner: &OwnerId) -> Result<Vec<StoredRun>, Response> {
    state.simulator.recorder().history(owner).map_err(|e| {
        tracing::error!(owner = %owner, error = %e, "failed to load run history");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response()
    })
}

/// Stored runs of the caller, oldest first.
pub async fn simulations_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(owner) = owner_from(&headers) else {
        return missing_owner();
    };
    match load_history(&state, &owner) {
        Ok(runs) => (
            StatusCode::OK,
            Json(HistoryResponse {
                owner: owner.to_string(),
                runs,
            }),
        )
            .into_response(),
        Err(response) => response,
    }
}

/// Trend summary over the caller's runs.
pub async fn trends_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(owner) = owner_from(&headers) else {
        return missing_owner();
    };
    match load_history(&state, &owner) {
        Ok(runs) => {
            let summary = TrendSummary::from_runs(runs.iter().map(|r| &r.run));
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(response) => response,
    }
}

// =============================================================================
// GRADE HANDLER
// =============================================================================

/// Grade a flat `{ metric: value }` sample. Unknown keys are ignored.
pub async fn grade_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Map<String, serde_json::Value>>,
) -> Response {
    let sample = match QualitySample::from_json_map(&body) {
        Ok(sample) => sample,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
                .into_response();
        }
    };

    match state.grader.assess(&sample).await {
        Ok(assessment) => (StatusCode::OK, Json(GradeResponse::from(assessment))).into_response(),
        Err(e) => {
            let status = if e.is_invalid_sample() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            (status, Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}

// =============================================================================
// SUBMISSION HANDLERS
// =============================================================================

/// Enqueue an asynchronous simulation.
///
/// The request is validated up front; a duplicate id that is still in
/// flight is answered 409 and not enqueued again.
pub async fn submit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmissionRequest>,
) -> Response {
    let id = request.submission_id.trim().to_string();
    if id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SubmissionResponse::rejected(id, "submission_id is required")),
        )
            .into_response();
    }

    let (context, influent) = match request
        .simulation
        .to_parts()
        .and_then(|(c, i)| validate_request(&c, &i).map(|()| (c, i)))
    {
        Ok(parts) => parts,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmissionResponse::rejected(id, e.to_string())),
            )
                .into_response();
        }
    };

    let submission = Submission {
        id: id.clone(),
        owner: owner_from(&headers),
        context,
        influent,
    };

    match state.queue.submit(submission) {
        Ok(SubmitOutcome::Accepted) => {
            (StatusCode::ACCEPTED, Json(SubmissionResponse::accepted(id))).into_response()
        }
        Ok(SubmitOutcome::AlreadyInFlight) => (
            StatusCode::CONFLICT,
            Json(SubmissionResponse::rejected(id, "submission already in flight")),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(submission = %id, error = %e, "submission rejected");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(SubmissionResponse::rejected(id, e.to_string())),
            )
                .into_response()
        }
    }
}

/// Ids of submissions still in flight.
pub async fn pending_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(PendingResponse {
        pending: state.queue.pending(),
    })
}

pub async fn submission_status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.queue.status(&id) {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("unknown submission '{id}'"))),
        )
            .into_response(),
    }
}
