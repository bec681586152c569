//! Resource Store fetches: the four live collections behind an answer.
//!
//! Four independent GETs executed concurrently; latency is bounded by the
//! slowest single fetch. Any failure fails the aggregate — the orchestrator
//! turns that into the fallback path, never a user-visible error. No
//! partial context.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

/// Errors from a context fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport failure or timeout.
    #[error("resource fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the Resource Store.
    #[error("resource {path} returned status {status}")]
    Status {
        /// Path of the failing endpoint.
        path: String,
        /// HTTP status code.
        status: u16,
    },
}

/// The four raw collections, unreduced.
///
/// Pins/shelters/food are opaque arrays of lat/lng-bearing objects;
/// `feed311` is a GeoJSON `FeatureCollection` of Points.
#[derive(Debug, Clone, Default)]
pub struct RawContext {
    /// Community pins.
    pub pins: Vec<Value>,
    /// Shelter records.
    pub shelters: Vec<Value>,
    /// Food/supply site records.
    pub food: Vec<Value>,
    /// 311 GeoJSON document.
    pub feed311: Value,
}

/// Read-only client for the Resource Store.
pub struct ResourceClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ResourceClient {
    /// Create a client for `base_url` with a per-call timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch all four collections concurrently.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<RawContext, FetchError> {
        let (pins, shelters, food, feed311) = tokio::try_join!(
            self.get_array("/api/pins"),
            self.get_array("/api/shelters"),
            self.get_array("/api/food"),
            self.get_json("/api/311"),
        )?;
        debug!(
            pins = pins.len(),
            shelters = shelters.len(),
            food = food.len(),
            "context fetched"
        );
        Ok(RawContext {
            pins,
            shelters,
            food,
            feed311,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(FetchError::Http)
    }

    /// Fetch a JSON array; a non-array body counts as empty rather than
    /// failing (the store's shape is not contractual beyond "objects with
    /// lat/lng-bearing fields").
    async fn get_array(&self, path: &str) -> Result<Vec<Value>, FetchError> {
        let value = self.get_json(path).await?;
        Ok(value.as_array().cloned().unwrap_or_default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
