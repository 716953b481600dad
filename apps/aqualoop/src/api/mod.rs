//! # AquaLoop HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /profiles` - Catalogued industries and default influent
//! - `POST /simulate` - Run the treatment pipeline and persist the run
//! - `GET /simulations` - Stored runs of the caller
//! - `GET /trends` - Trend summary over the caller's runs
//! - `POST /grade` - Reuse grade of a water sample
//! - `POST /submissions` - Enqueue an asynchronous simulation
//! - `GET /submissions/pending` - Submission ids still in flight
//! - `GET /submissions/{id}` - Status of one submission
//!
//! The caller's identity is read from the `X-Owner-Id` header.
//!
//! ## Security Configuration
//!
//! - `server.cors_origins` / `AQUALOOP_CORS_ORIGINS`: comma-separated origins, or "*" (default: localhost only)
//! - `server.rate_limit` / `AQUALOOP_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `AQUALOOP_API_KEY`: if set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use handlers::OWNER_HEADER;
pub use middleware::create_rate_limiter;
pub use types::{
    ErrorResponse, GradeResponse, HealthResponse, HistoryResponse, PendingResponse,
    ProfileResponse, SimulateRequest, SimulateResponse, SubmissionRequest, SubmissionResponse,
};

use crate::cli::open_store;
use crate::client::PredictionClient;
use crate::config::{Config, ServerConfig};
use crate::error::AppError;
use crate::queue::SubmissionQueue;
use aqualoop_core::{GradeService, Grader, PredictionService, RunStore, Simulator, StageCatalog};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The simulator as shared by handlers and the submission worker.
pub type SharedSimulator = Arc<Simulator<Arc<dyn PredictionService>, Arc<dyn RunStore>>>;

pub type SharedGrader = Arc<Grader<Arc<dyn GradeService>>>;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub simulator: SharedSimulator,
    pub grader: SharedGrader,
    pub queue: SubmissionQueue,
}

impl AppState {
    /// Build the simulator over the standard catalog and start the
    /// submission worker. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(
        service: Arc<dyn PredictionService>,
        grades: Arc<dyn GradeService>,
        store: Arc<dyn RunStore>,
        server: &ServerConfig,
    ) -> Self {
        let simulator = Arc::new(Simulator::new(StageCatalog::standard(), service, store));
        let queue = SubmissionQueue::spawn(
            Arc::clone(&simulator),
            server.queue_capacity,
            server.retained_statuses,
        );
        Self {
            simulator,
            grader: Arc::new(Grader::new(grades)),
            queue,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn owner_header() -> HeaderName {
    HeaderName::from_static(OWNER_HEADER)
}

/// Build the CORS layer.
///
/// - "*": allows all origins
/// - unset: localhost only
/// - otherwise: the comma-separated list of origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, owner_header()])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, owner_header()])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - if enabled
/// 4. Authentication - if an API key is configured
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(server.cors_origins.as_deref());

    let rate_limiter = if server.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", server.rate_limit);
        Some(create_rate_limiter(server.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key = ApiKey::from_config(server.api_key.as_deref());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set AQUALOOP_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/profiles", get(handlers::profiles_handler))
        .route("/simulate", post(handlers::simulate_handler))
        .route("/simulations", get(handlers::simulations_handler))
        .route("/trends", get(handlers::trends_handler))
        .route("/grade", post(handlers::grade_handler))
        .route("/submissions", post(handlers::submit_handler))
        .route("/submissions/pending", get(handlers::pending_handler))
        .route("/submissions/{id}", get(handlers::submission_status_handler));

    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(256 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn run_server(config: &Config) -> Result<(), AppError> {
    let client = Arc::new(PredictionClient::from_config(&config.prediction)?);
    let store = open_store(&config.storage)?;
    let state = AppState::new(client.clone(), client, store, &config.server);
    let router = create_router(state, &config.server);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Server(format!("Bind failed: {}", e)))?;

    tracing::info!("AquaLoop HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
