//! End-to-end flight analysis: path → corridor → crossings → report.

use serde::{Deserialize, Serialize};
use tracing::info;

use skycheck_core::models::{Crossing, FlightPath};
use skycheck_core::report::CrossingReport;
use skycheck_core::CorridorParams;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::query::QueryEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightInfo {
    pub waypoints: usize,
    pub total_distance_km: f64,
    pub min_altitude_ft: Option<f64>,
    pub max_altitude_ft: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightAnalysis {
    pub flight: FlightInfo,
    pub corridor: CorridorParams,
    pub crossings: Vec<Crossing>,
    pub report: CrossingReport,
}

/// Run the corridor query over a flight path and bundle the results.
pub async fn analyze_flight(
    engine: &QueryEngine,
    path: &FlightPath,
    params: &CorridorParams,
    cancel: &CancelToken,
) -> Result<FlightAnalysis> {
    let crossings = engine.crossings(path, params, cancel).await?;
    let report = CrossingReport::categorize(&crossings);
    let altitude_range = path.altitude_range_ft();

    info!(
        waypoints = path.len(),
        distance_km = path.total_length_km(),
        crossings = crossings.len(),
        critical = report.critical,
        "Flight analysis complete"
    );

    Ok(FlightAnalysis {
        flight: FlightInfo {
            waypoints: path.len(),
            total_distance_km: path.total_length_km(),
            min_altitude_ft: altitude_range.map(|r| r.0),
            max_altitude_ft: altitude_range.map(|r| r.1),
        },
        corridor: *params,
        crossings,
        report,
    })
}

/// The machine-readable crossings list (§6.4 contract): a JSON array
/// sorted by `distance_km`.
pub fn crossings_to_json(crossings: &[Crossing]) -> Result<String> {
    serde_json::to_string_pretty(crossings)
        .map_err(|e| Error::Internal(format!("serializing crossings: {e}")))
}
