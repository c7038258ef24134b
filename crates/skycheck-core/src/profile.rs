//! Flight-profile correction: branch analysis and climb/descent insertion.
//!
//! The corrector rewrites a waypoint sequence into a flyable altitude
//! profile. Endpoint altitudes are anchored to field elevation + 1000 ft,
//! then each branch between consecutive waypoints is classified:
//!
//! - a higher demanded altitude is climbed to starting at the branch's
//!   first waypoint, so the aircraft is level at the demand when it
//!   reaches the branch's end waypoint;
//! - a lower demanded altitude gets a top-of-descent placed so the
//!   descent completes exactly at the branch's end waypoint;
//! - targets that cannot be met within the branch at the configured
//!   vertical rate are clamped to the branch end and flagged unreachable.
//!
//! Network interaction (terrain elevation) stays outside: callers resolve
//! the two endpoint elevations first and hand them in, keeping this a
//! pure function.

use serde::{Deserialize, Serialize};

use crate::models::{FlightPath, Waypoint};
use crate::spatial::{great_circle_km, interpolate_position};
use crate::units::km_to_nm;

/// Altitude differences at or below this are flown as level.
pub const LEVEL_TOLERANCE_FT: f64 = 50.0;

/// Waypoints inserted by a previous correction run carry these id prefixes
/// and are stripped before re-analysis, making the corrector idempotent.
pub const TRANSITION_PREFIXES: [&str; 2] = ["Climb_", "Descent_"];

/// Vertical rates and ground speed used for transition placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfileParams {
    pub climb_rate_ftpm: f64,
    pub descent_rate_ftpm: f64,
    pub ground_speed_kt: f64,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            climb_rate_ftpm: 500.0,
            descent_rate_ftpm: 500.0,
            ground_speed_kt: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BranchAction {
    Climb,
    Descent,
    Level,
}

/// One row of the branch analysis table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchReport {
    /// 1-based branch index.
    pub index: usize,
    pub distance_nm: f64,
    pub action: BranchAction,
    pub from_alt_ft: f64,
    pub to_alt_ft: f64,
    /// The target could not be reached within the branch at the configured rate.
    pub unreachable: bool,
    /// The endpoint elevation behind this branch came from the 0-ft fallback.
    pub elevation_estimated: bool,
}

/// Corrector output: the rewritten path plus the per-branch table.
#[derive(Debug, Clone)]
pub struct CorrectedProfile {
    pub path: FlightPath,
    pub branches: Vec<BranchReport>,
    pub elevation_estimated: bool,
}

pub fn is_transition_waypoint(id: &str) -> bool {
    TRANSITION_PREFIXES.iter().any(|p| id.starts_with(p))
}

/// Correct a flight path into a physically flyable profile.
///
/// `departure_elevation_ft` / `arrival_elevation_ft` are terrain samples at
/// the endpoint coordinates; `elevation_estimated` records that they came
/// from the fallback rather than the oracle.
pub fn correct_profile(
    path: &FlightPath,
    params: &ProfileParams,
    departure_elevation_ft: f64,
    arrival_elevation_ft: f64,
    elevation_estimated: bool,
) -> CorrectedProfile {
    // Re-correcting a corrected path must reproduce it.
    let mut waypoints: Vec<Waypoint> = path
        .waypoints()
        .iter()
        .filter(|w| !is_transition_waypoint(&w.id))
        .cloned()
        .collect();
    if waypoints.len() < 2 {
        waypoints = path.waypoints().to_vec();
    }
    let n = waypoints.len();

    // Demanded altitude at each waypoint: anchored endpoints, published
    // altitudes in between, flagged (NaN) waypoints demand no change.
    let mut demanded = vec![0.0_f64; n];
    demanded[0] = departure_elevation_ft + 1000.0;
    for j in 1..n - 1 {
        demanded[j] = if waypoints[j].altitude_ft.is_nan() {
            demanded[j - 1]
        } else {
            waypoints[j].altitude_ft
        };
    }
    demanded[n - 1] = arrival_elevation_ft + 1000.0;

    let speed_nm_per_min = params.ground_speed_kt / 60.0;
    let mut current_alt = demanded[0];

    let mut corrected = Vec::with_capacity(n + 2);
    let mut first = waypoints[0].clone();
    first.altitude_ft = current_alt;
    corrected.push(first);

    let mut branches = Vec::with_capacity(n - 1);

    for b in 1..n {
        let from = waypoints[b - 1].clone();
        let mut to = waypoints[b].clone();
        let distance_nm = km_to_nm(great_circle_km(from.lat, from.lon, to.lat, to.lon));
        let target = demanded[b];
        let delta = target - current_alt;
        let branch_estimated = elevation_estimated && (b == 1 || b == n - 1);

        if delta.abs() <= LEVEL_TOLERANCE_FT {
            // The final waypoint still lands exactly on its anchor.
            let exit_alt = if b == n - 1 { target } else { current_alt };
            branches.push(BranchReport {
                index: b,
                distance_nm,
                action: BranchAction::Level,
                from_alt_ft: current_alt,
                to_alt_ft: exit_alt,
                unreachable: false,
                elevation_estimated: branch_estimated,
            });
            current_alt = exit_alt;
            to.altitude_ft = current_alt;
            corrected.push(to);
            continue;
        }

        let climbing = delta > 0.0;
        let rate = if climbing {
            params.climb_rate_ftpm
        } else {
            params.descent_rate_ftpm
        };
        let required_nm = delta.abs() / rate * speed_nm_per_min;
        let unreachable = required_nm >= distance_nm;

        if !unreachable {
            let transition = if climbing {
                // End of climb: reached `required_nm` after the branch start.
                let fraction = required_nm / distance_nm;
                let (lat, lon) =
                    interpolate_position(from.lat, from.lon, to.lat, to.lon, fraction);
                Waypoint::new(
                    format!("Climb_{}_{}", from.id, target.round() as i64),
                    lat,
                    lon,
                    target,
                )
            } else {
                // Top of descent: the lower altitude is reached exactly at
                // the branch end waypoint.
                let fraction = (distance_nm - required_nm) / distance_nm;
                let (lat, lon) =
                    interpolate_position(from.lat, from.lon, to.lat, to.lon, fraction);
                Waypoint::new(
                    format!("Descent_{}_{}", current_alt.round() as i64, to.id),
                    lat,
                    lon,
                    current_alt,
                )
            };
            corrected.push(transition);
        }

        branches.push(BranchReport {
            index: b,
            distance_nm,
            action: if climbing {
                BranchAction::Climb
            } else {
                BranchAction::Descent
            },
            from_alt_ft: current_alt,
            to_alt_ft: target,
            unreachable,
            elevation_estimated: branch_estimated,
        });

        current_alt = target;
        to.altitude_ft = current_alt;
        corrected.push(to);
    }

    let path = FlightPath::new(corrected)
        .expect("corrected profile keeps the validated input ordering");
    CorrectedProfile {
        path,
        branches,
        elevation_estimated,
    }
}
