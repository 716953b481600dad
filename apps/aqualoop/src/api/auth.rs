//! # Authentication Module
//!
//! Simple API key authentication for the AquaLoop HTTP API.
//!
//! ## Configuration
//!
//! - `AQUALOOP_API_KEY`: If set, all requests (except /health) require this key
//!
//! ## Usage
//!
//! Send the API key in the Authorization header:
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```
//!
//! The key only gates access to the API. The owner of persisted runs is
//! supplied separately in the `X-Owner-Id` header.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// The configured API key.
#[derive(Clone)]
pub struct ApiKey(pub Arc<str>);

impl ApiKey {
    /// `None` for an absent or empty key, which disables authentication.
    #[must_use]
    pub fn from_config(key: Option<&str>) -> Option<Self> {
        key.filter(|k| !k.is_empty()).map(|k| Self(Arc::from(k)))
    }

    /// Constant-time comparison.
    ///
    /// Both keys are padded to the same length so `ct_eq` always runs over
    /// the same number of bytes.
    #[must_use]
    pub fn matches(&self, provided: &str) -> bool {
        let provided_bytes = provided.as_bytes();
        let expected_bytes = self.0.as_bytes();

        let max_len = provided_bytes.len().max(expected_bytes.len());
        let mut padded_provided = vec![0u8; max_len];
        let mut padded_expected = vec![0u8; max_len];
        padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
        padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

        let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
        bytes_match && provided_bytes.len() == expected_bytes.len()
    }
}

/// API key authentication middleware.
///
/// - `/health` is always allowed (for load balancer health checks)
/// - Everything else requires `Authorization: Bearer <key>` or the raw key
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            let provided_key = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if expected.matches(provided_key) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}
