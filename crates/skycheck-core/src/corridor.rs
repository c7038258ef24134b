//! Corridor construction: the 3-D envelope tested against airspaces.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::buffer::buffer_polyline;
use crate::models::FlightPath;

/// Corridor margins around a flight path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CorridorParams {
    /// Lateral half-width in nautical miles.
    pub width_nm: f64,
    /// Vertical half-height in feet.
    pub height_ft: f64,
}

impl Default for CorridorParams {
    fn default() -> Self {
        Self {
            width_nm: 10.0,
            height_ft: 1000.0,
        }
    }
}

/// A buffered flight path with its altitude interval.
#[derive(Debug, Clone)]
pub struct Corridor {
    /// Buffer polygon(s) in geographic (lon, lat) coordinates.
    pub polygon: MultiPolygon<f64>,
    /// Closed altitude interval in feet MSL; the upper bound is `+∞` only
    /// if a waypoint carried an infinite altitude, which parsing forbids.
    pub min_alt_ft: f64,
    pub max_alt_ft: f64,
}

impl Corridor {
    /// Expand a flight path into a corridor.
    ///
    /// The altitude interval is `[min(wp.alt) - height_ft, max(wp.alt) + height_ft]`.
    /// Waypoints flagged with a missing altitude are ignored for the interval;
    /// a path with no altitudes at all gets a ground-anchored interval.
    pub fn from_path(path: &FlightPath, params: &CorridorParams) -> Self {
        let points: Vec<(f64, f64)> = path.waypoints().iter().map(|w| (w.lat, w.lon)).collect();
        let polygon = buffer_polyline(&points, params.width_nm);

        let (lo, hi) = path.altitude_range_ft().unwrap_or((0.0, 0.0));
        Self {
            polygon,
            min_alt_ft: lo - params.height_ft,
            max_alt_ft: hi + params.height_ft,
        }
    }

    /// Closed-interval overlap against an airspace band.
    pub fn overlaps_band(&self, band_lo_ft: f64, band_hi_ft: f64) -> bool {
        self.min_alt_ft <= band_hi_ft && band_lo_ft <= self.max_alt_ft
    }
}
