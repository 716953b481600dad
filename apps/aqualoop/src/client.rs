//! # Prediction Client
//!
//! HTTP implementation of the core [`PredictionService`] and
//! [`GradeService`] seams.
//!
//! Every stage is one `POST` of the flat request body to
//! `{base_url}{stage_path}`; every grade is one `POST` of the flat sample to
//! `{base_url}{grade_path}`. Response bodies are handed back unparsed; the
//! core validates them.

use crate::config::PredictionConfig;
use crate::error::AppError;
use aqualoop_core::{
    ExecutionError, GradeService, PredictionService, QualitySample, StageRequest, async_trait,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Grade path used unless [`PredictionClient::with_grade_path`] says otherwise.
pub const DEFAULT_GRADE_PATH: &str = "/predict";

/// Talks to the remote treatment prediction and grading service.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    base_url: String,
    url: String,
    grade_url: String,
}

impl PredictionClient {
    /// Create a client for `{base_url}{stage_path}` with a per-request timeout.
    pub fn new(base_url: &str, stage_path: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Client(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            url: format!("{base_url}{stage_path}"),
            grade_url: format!("{base_url}{DEFAULT_GRADE_PATH}"),
            base_url,
        })
    }

    /// Send grade requests to `{base_url}{path}`.
    #[must_use]
    pub fn with_grade_path(mut self, path: &str) -> Self {
        self.grade_url = format!("{}{}", self.base_url, path);
        self
    }

    pub fn from_config(config: &PredictionConfig) -> Result<Self, AppError> {
        Ok(Self::new(&config.base_url, &config.stage_path, config.timeout())?
            .with_grade_path(&config.grade_path))
    }

    /// Full stage prediction URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Full grade prediction URL.
    #[must_use]
    pub fn grade_url(&self) -> &str {
        &self.grade_url
    }

    /// POST `body` as JSON to `url` and return the parsed response.
    async fn post_json<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Value, ExecutionError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;
        handle_response(resp).await
    }
}

fn transport_error(url: &str, e: &reqwest::Error) -> ExecutionError {
    if e.is_timeout() {
        ExecutionError::TimedOut
    } else {
        ExecutionError::Unreachable(format!("{url}: {e}"))
    }
}

/// Check the status code and parse the JSON body.
async fn handle_response(resp: reqwest::Response) -> Result<Value, ExecutionError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ExecutionError::Status {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            ExecutionError::TimedOut
        } else {
            ExecutionError::Malformed(e.to_string())
        }
    })
}

#[async_trait]
impl PredictionService for PredictionClient {
    async fn predict_stage(&self, request: &StageRequest) -> Result<Value, ExecutionError> {
        self.post_json(&self.url, request).await
    }
}

#[async_trait]
impl GradeService for PredictionClient {
    async fn predict_grade(&self, sample: &QualitySample) -> Result<Value, ExecutionError> {
        self.post_json(&self.grade_url, sample).await
    }
}
