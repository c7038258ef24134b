//! Terrain elevation oracle.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

const OPEN_ELEVATION_URL: &str = "https://api.open-elevation.com/api/v1/lookup";

/// Terrain elevation lookup for a WGS-84 coordinate, in meters MSL.
///
/// The only suspension point in the whole pipeline; everything else is
/// CPU-bound. Implementations are expected to respect the per-call timeout
/// themselves.
#[async_trait]
pub trait ElevationOracle: Send + Sync {
    async fn elevation_m(&self, lat: f64, lon: f64) -> Result<f64>;
}

/// Cache key: coordinates rounded to 5 decimal places (~1 m).
fn cache_key(lat: f64, lon: f64) -> (i64, i64) {
    ((lat * 1e5).round() as i64, (lon * 1e5).round() as i64)
}

/// Client for the public Open-Elevation API.
pub struct OpenElevationClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    cache: DashMap<(i64, i64), f64>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: Option<f64>,
}

impl OpenElevationClient {
    pub fn new(timeout_s: u64) -> Self {
        Self::with_base_url(OPEN_ELEVATION_URL, timeout_s)
    }

    /// Point the client at another endpoint with the same contract
    /// (useful against a local mock).
    pub fn with_base_url(base_url: impl Into<String>, timeout_s: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_s.max(1)),
            cache: DashMap::new(),
        }
    }
}

#[async_trait]
impl ElevationOracle for OpenElevationClient {
    async fn elevation_m(&self, lat: f64, lon: f64) -> Result<f64> {
        let key = cache_key(lat, lon);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(*hit);
        }

        let url = format!("{}?locations={:.6},{:.6}", self.base_url, lat, lon);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::NetworkUnavailable(format!(
                "elevation provider HTTP {}",
                response.status()
            )));
        }

        let payload: LookupResponse = response.json().await?;
        let elevation = payload
            .results
            .first()
            .and_then(|r| r.elevation)
            .filter(|e| e.is_finite())
            .ok_or_else(|| {
                Error::NetworkUnavailable("elevation provider returned no sample".to_string())
            })?;

        debug!("Elevation for ({:.5}, {:.5}): {:.1} m", lat, lon, elevation);
        self.cache.insert(key, elevation);
        Ok(elevation)
    }
}

/// Fixed-elevation oracle for tests and offline runs.
pub struct FixedElevation(pub f64);

#[async_trait]
impl ElevationOracle for FixedElevation {
    async fn elevation_m(&self, _lat: f64, _lon: f64) -> Result<f64> {
        Ok(self.0)
    }
}

/// Oracle that always fails; exercises the degradation paths.
pub struct UnavailableElevation;

#[async_trait]
impl ElevationOracle for UnavailableElevation {
    async fn elevation_m(&self, _lat: f64, _lon: f64) -> Result<f64> {
        Err(Error::NetworkUnavailable("elevation oracle offline".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_round_to_five_decimals() {
        assert_eq!(cache_key(48.000001, 2.0), cache_key(48.000004, 2.0));
        assert_ne!(cache_key(48.0001, 2.0), cache_key(48.0002, 2.0));
    }

    #[tokio::test]
    async fn fixed_oracle_returns_its_value() {
        let oracle = FixedElevation(167.0);
        assert_eq!(oracle.elevation_m(48.0, 2.0).await.unwrap(), 167.0);
    }
}
