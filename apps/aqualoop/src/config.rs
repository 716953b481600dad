//! # Configuration
//!
//! Optional TOML file plus environment overrides.
//!
//! ```toml
//! [prediction]
//! base_url = "http://127.0.0.1:8000"
//! stage_path = "/treatment/predict-stage"
//! grade_path = "/predict"
//! timeout_secs = 30
//!
//! [storage]
//! backend = "redb"      # or "memory"
//! path = "aqualoop.redb"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100      # requests/second, 0 disables
//! cors_origins = "http://localhost:3000"
//! queue_capacity = 64
//! retained_statuses = 1024
//! ```
//!
//! ## Environment Variables
//!
//! - `AQUALOOP_PREDICTION_URL`: overrides `prediction.base_url`
//! - `AQUALOOP_API_KEY`: enables Bearer authentication on the HTTP API
//! - `AQUALOOP_RATE_LIMIT`: overrides `server.rate_limit`
//! - `AQUALOOP_CORS_ORIGINS`: overrides `server.cors_origins` ("*" for all)

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` is given, if present.
pub const DEFAULT_CONFIG_FILE: &str = "aqualoop.toml";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub prediction: PredictionConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

/// Where stage predictions and grades are requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictionConfig {
    pub base_url: String,
    pub stage_path: String,
    pub grade_path: String,
    pub timeout_secs: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            stage_path: "/treatment/predict-stage".to_string(),
            grade_path: "/predict".to_string(),
            timeout_secs: 30,
        }
    }
}

impl PredictionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Redb,
            path: PathBuf::from("aqualoop.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Comma-separated origins, or "*". Localhost only when unset.
    pub cors_origins: Option<String>,
    /// Bearer key for the HTTP API. Only taken from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Submissions buffered ahead of the worker.
    pub queue_capacity: usize,
    /// Finished submission statuses kept for lookup, oldest evicted first.
    pub retained_statuses: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit: 100,
            cors_origins: None,
            api_key: None,
            queue_capacity: 64,
            retained_statuses: 1024,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load configuration and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `aqualoop.toml` in the
    /// working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(p) => Self::read_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_toml_str(&text)
    }

    /// Apply `AQUALOOP_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored. An unparsable rate limit is logged and
    /// skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("AQUALOOP_PREDICTION_URL") {
            self.prediction.base_url = url;
        }
        if let Some(key) = get("AQUALOOP_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(limit) = get("AQUALOOP_RATE_LIMIT") {
            match limit.trim().parse() {
                Ok(rps) => self.server.rate_limit = rps,
                Err(e) => tracing::warn!(value = %limit, error = %e, "ignoring AQUALOOP_RATE_LIMIT"),
            }
        }
        if let Some(origins) = get("AQUALOOP_CORS_ORIGINS") {
            self.server.cors_origins = Some(origins);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [prediction]
            base_url = "http://ml.internal:9000"

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.prediction.base_url, "http://ml.internal:9000");
        assert_eq!(config.prediction.stage_path, "/treatment/predict-stage");
        assert_eq!(config.prediction.grade_path, "/predict");
        assert_eq!(config.prediction.timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.retained_statuses, 1024);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = Config::from_toml_str("[server]\nprot = 1\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AQUALOOP_PREDICTION_URL", "http://10.0.0.5:8000"),
            ("AQUALOOP_API_KEY", "secret"),
            ("AQUALOOP_RATE_LIMIT", "0"),
            ("AQUALOOP_CORS_ORIGINS", "*"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.prediction.base_url, "http://10.0.0.5:8000");
        assert_eq!(config.server.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.rate_limit, 0);
        assert_eq!(config.server.cors_origins.as_deref(), Some("*"));
    }

    #[test]
    fn bad_rate_limit_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "AQUALOOP_RATE_LIMIT").then(|| "fast".to_string()));
        assert_eq!(config.server.rate_limit, 100);
    }

    #[test]
    fn explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
