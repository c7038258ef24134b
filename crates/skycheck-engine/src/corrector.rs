//! Profile-correction driver: elevation lookups around the pure algorithm.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use skycheck_core::profile::{correct_profile, CorrectedProfile};
use skycheck_core::units::meters_to_feet;
use skycheck_core::{FlightPath, ProfileParams};

use crate::config::Config;
use crate::elevation::ElevationOracle;
use crate::error::Result;

/// Correct a flight path, resolving endpoint field elevations through the
/// oracle under an overall time budget.
///
/// On `NetworkUnavailable`/`Timeout` (or budget exhaustion) the ground
/// falls back to 0 ft MSL and the result is flagged `elevation_estimated`.
pub async fn correct_flight_path(
    path: &FlightPath,
    params: &ProfileParams,
    oracle: &dyn ElevationOracle,
    config: &Config,
) -> Result<CorrectedProfile> {
    let budget = Duration::from_secs(config.elevation_budget_s.max(1));
    let (Some(departure), Some(arrival)) = (path.waypoints().first(), path.waypoints().last())
    else {
        return Err(crate::error::Error::InputMalformed(
            "flight path has no endpoints".into(),
        ));
    };

    let mut estimated = false;
    let lookups = async {
        let dep = oracle.elevation_m(departure.lat, departure.lon).await;
        let arr = oracle.elevation_m(arrival.lat, arrival.lon).await;
        (dep, arr)
    };

    let (departure_elev_ft, arrival_elev_ft) = match timeout(budget, lookups).await {
        Ok((dep, arr)) => {
            let dep_ft = match dep {
                Ok(m) => meters_to_feet(m),
                Err(err) => {
                    warn!("Departure elevation lookup failed: {}; using 0 ft", err);
                    estimated = true;
                    0.0
                }
            };
            let arr_ft = match arr {
                Ok(m) => meters_to_feet(m),
                Err(err) => {
                    warn!("Arrival elevation lookup failed: {}; using 0 ft", err);
                    estimated = true;
                    0.0
                }
            };
            (dep_ft, arr_ft)
        }
        Err(_) => {
            warn!(
                "Elevation budget of {}s exhausted; using 0 ft for both endpoints",
                config.elevation_budget_s
            );
            estimated = true;
            (0.0, 0.0)
        }
    };

    Ok(correct_profile(
        path,
        params,
        departure_elev_ft,
        arrival_elev_ft,
        estimated,
    ))
}
