//! Core data models shared across extraction, querying and correction.

use serde::{Deserialize, Serialize};

use crate::spatial::great_circle_km;
use crate::units::AltitudeLimit;

/// Airspace type tag from the AIXM dataset, collapsed to a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AirspaceType {
    /// Regulated airspace (French AIP "RAS").
    Ras,
    /// Terminal control area.
    Tma,
    /// Control zone.
    Ctr,
    /// Restricted area.
    Restricted,
    /// Danger area.
    Danger,
    /// Prohibited area.
    Prohibited,
    /// Control area.
    Cta,
    /// Other danger area; also the sink for unknown type codes.
    DOther,
    /// Recognized but uncategorized type (FIR, SIV, sectors, ...).
    Other,
}

impl AirspaceType {
    /// Map a raw AIXM `codeType` to the closed set. Unknown codes collapse
    /// to `D-OTHER`, preserving the dataset's "other danger area" semantics.
    pub fn from_code(code: &str) -> Self {
        match code {
            "RAS" => AirspaceType::Ras,
            "TMA" => AirspaceType::Tma,
            "CTR" => AirspaceType::Ctr,
            "R" => AirspaceType::Restricted,
            "D" => AirspaceType::Danger,
            "P" => AirspaceType::Prohibited,
            "CTA" => AirspaceType::Cta,
            "D-OTHER" => AirspaceType::DOther,
            "FIR" | "UIR" | "UTA" | "SIV" | "SECTOR" | "CLASS" | "ADIZ" | "OCA" | "TSA"
            | "CBA" | "AWY" | "OTHER" => AirspaceType::Other,
            _ => AirspaceType::DOther,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AirspaceType::Ras => "RAS",
            AirspaceType::Tma => "TMA",
            AirspaceType::Ctr => "CTR",
            AirspaceType::Restricted => "R",
            AirspaceType::Danger => "D",
            AirspaceType::Prohibited => "P",
            AirspaceType::Cta => "CTA",
            AirspaceType::DOther => "D-OTHER",
            AirspaceType::Other => "OTHER",
        }
    }
}

/// A controlled or restricted volume of air.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airspace {
    pub id: i64,
    /// Official code, e.g. `LFR35A`. Unique per extraction batch.
    pub code_id: String,
    pub code_type: AirspaceType,
    /// Airspace class letter (A..G) when published.
    pub airspace_class: Option<char>,
    pub name: String,
    pub min_altitude: Option<AltitudeLimit>,
    pub max_altitude: Option<AltitudeLimit>,
    pub operating_hours: Option<String>,
    pub remarks: Option<String>,
}

impl Airspace {
    /// Vertical extent in feet MSL: `[floor, ceiling]` with missing limits
    /// defaulting to ground and unlimited.
    pub fn altitude_band_ft(&self) -> (f64, f64) {
        let lo = self.min_altitude.map(|l| l.to_feet()).unwrap_or(0.0);
        let hi = self
            .max_altitude
            .map(|l| l.to_feet())
            .unwrap_or(f64::INFINITY);
        (lo, hi)
    }

    /// Critical volumes are prohibited/restricted areas and Class A.
    pub fn is_critical(&self) -> bool {
        matches!(
            self.code_type,
            AirspaceType::Prohibited | AirspaceType::Restricted
        ) || self.airspace_class == Some('A')
    }
}

/// A boundary point in WGS-84 decimal degrees; `ordinal` fixes the
/// assembly order within its border.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vertex {
    pub ordinal: i64,
    pub lat: f64,
    pub lon: f64,
}

impl Vertex {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A flight-path point. Altitude is feet MSL; `NAN` marks a waypoint the
/// input carried no altitude for (the profile corrector resolves those).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub name: Option<String>,
}

impl Waypoint {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64, altitude_ft: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
            altitude_ft,
            name: None,
        }
    }
}

/// An ordered waypoint sequence. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightPath {
    waypoints: Vec<Waypoint>,
}

impl FlightPath {
    /// Validates the sequence: at least two waypoints, finite coordinates,
    /// no two adjacent waypoints at the same position.
    pub fn new(waypoints: Vec<Waypoint>) -> Result<Self, String> {
        if waypoints.len() < 2 {
            return Err(format!(
                "a flight path needs at least 2 waypoints, got {}",
                waypoints.len()
            ));
        }
        for wp in &waypoints {
            if !wp.lat.is_finite() || !wp.lon.is_finite() {
                return Err(format!("waypoint {} has non-finite coordinates", wp.id));
            }
        }
        for pair in waypoints.windows(2) {
            if pair[0].lat == pair[1].lat && pair[0].lon == pair[1].lon {
                return Err(format!(
                    "adjacent waypoints {} and {} share the same position",
                    pair[0].id, pair[1].id
                ));
            }
        }
        Ok(Self { waypoints })
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Total arc length in kilometers.
    pub fn total_length_km(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|p| great_circle_km(p[0].lat, p[0].lon, p[1].lat, p[1].lon))
            .sum()
    }

    /// Minimum and maximum waypoint altitude in feet, ignoring flagged
    /// (NaN) waypoints. `None` when no waypoint carries an altitude.
    pub fn altitude_range_ft(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for wp in &self.waypoints {
            if wp.altitude_ft.is_nan() {
                continue;
            }
            range = Some(match range {
                None => (wp.altitude_ft, wp.altitude_ft),
                Some((lo, hi)) => (lo.min(wp.altitude_ft), hi.max(wp.altitude_ft)),
            });
        }
        range
    }
}

/// One reported airspace traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crossing {
    pub airspace_id: i64,
    pub code_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub airspace_type: AirspaceType,
    #[serde(rename = "class")]
    pub airspace_class: Option<char>,
    /// Floor in feet MSL; `None` when unpublished.
    pub min_alt_ft: Option<f64>,
    /// Ceiling in feet MSL; `None` when unpublished or unlimited.
    pub max_alt_ft: Option<f64>,
    /// Arc length from the path start to the crossing entry, kilometers.
    pub distance_km: f64,
    pub entry_alt_ft: f64,
    pub exit_alt_ft: f64,
    pub critical: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_codes_collapse_to_d_other() {
        assert_eq!(AirspaceType::from_code("ZZZ"), AirspaceType::DOther);
        assert_eq!(AirspaceType::from_code("TMA"), AirspaceType::Tma);
        assert_eq!(AirspaceType::from_code("FIR"), AirspaceType::Other);
    }

    #[test]
    fn critical_flag_covers_p_r_and_class_a() {
        let mut airspace = Airspace {
            id: 1,
            code_id: "LFP1".into(),
            code_type: AirspaceType::Prohibited,
            airspace_class: None,
            name: "P 1".into(),
            min_altitude: None,
            max_altitude: None,
            operating_hours: None,
            remarks: None,
        };
        assert!(airspace.is_critical());

        airspace.code_type = AirspaceType::Tma;
        assert!(!airspace.is_critical());

        airspace.airspace_class = Some('A');
        assert!(airspace.is_critical());
    }

    #[test]
    fn altitude_band_defaults_to_ground_and_unlimited() {
        let airspace = Airspace {
            id: 1,
            code_id: "LFR1".into(),
            code_type: AirspaceType::Restricted,
            airspace_class: None,
            name: "R 1".into(),
            min_altitude: None,
            max_altitude: Some(AltitudeLimit::Unlimited),
            operating_hours: None,
            remarks: None,
        };
        let (lo, hi) = airspace.altitude_band_ft();
        assert_eq!(lo, 0.0);
        assert!(hi.is_infinite());
    }

    #[test]
    fn flight_path_rejects_short_or_duplicated_input() {
        assert!(FlightPath::new(vec![Waypoint::new("A", 48.0, 2.0, 1000.0)]).is_err());
        assert!(FlightPath::new(vec![
            Waypoint::new("A", 48.0, 2.0, 1000.0),
            Waypoint::new("B", 48.0, 2.0, 2000.0),
        ])
        .is_err());
    }

    #[test]
    fn path_length_accumulates_over_segments() {
        let path = FlightPath::new(vec![
            Waypoint::new("A", 48.0, 2.0, 1000.0),
            Waypoint::new("B", 49.0, 2.0, 1000.0),
            Waypoint::new("C", 50.0, 2.0, 1000.0),
        ])
        .unwrap();
        assert!((path.total_length_km() - 222.39).abs() < 0.2);
    }

    #[test]
    fn altitude_range_skips_flagged_waypoints() {
        let path = FlightPath::new(vec![
            Waypoint::new("A", 48.0, 2.0, 1000.0),
            Waypoint::new("B", 48.5, 2.0, f64::NAN),
            Waypoint::new("C", 49.0, 2.0, 3000.0),
        ])
        .unwrap();
        assert_eq!(path.altitude_range_ft(), Some((1000.0, 3000.0)));
    }
}
