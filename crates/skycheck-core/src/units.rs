//! Altitude units and aviation unit conversions.

use serde::{Deserialize, Serialize};

pub const FEET_PER_METER: f64 = 3.28084;
pub const KM_PER_NM: f64 = 1.852;

/// A vertical limit as published in the AIXM dataset.
///
/// Comparisons never mix units: callers normalize through [`AltitudeLimit::to_feet`],
/// which maps `Unlimited` to `+∞` and `Ground` to `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value")]
pub enum AltitudeLimit {
    /// Feet above mean sea level.
    #[serde(rename = "FT")]
    Feet(i32),
    /// Flight level (hundreds of feet on standard pressure).
    #[serde(rename = "FL")]
    FlightLevel(u16),
    /// Meters above mean sea level.
    #[serde(rename = "M")]
    Meters(f64),
    /// Ground level.
    #[serde(rename = "GND")]
    Ground,
    /// No upper bound.
    #[serde(rename = "UNL")]
    Unlimited,
}

impl AltitudeLimit {
    /// Normalize to feet MSL. `Unlimited` becomes `+∞` so interval
    /// comparisons work without special cases.
    pub fn to_feet(&self) -> f64 {
        match self {
            AltitudeLimit::Feet(v) => *v as f64,
            AltitudeLimit::FlightLevel(fl) => *fl as f64 * 100.0,
            AltitudeLimit::Meters(m) => m * FEET_PER_METER,
            AltitudeLimit::Ground => 0.0,
            AltitudeLimit::Unlimited => f64::INFINITY,
        }
    }

    /// Unit tag as stored in the database.
    pub fn unit_str(&self) -> &'static str {
        match self {
            AltitudeLimit::Feet(_) => "FT",
            AltitudeLimit::FlightLevel(_) => "FL",
            AltitudeLimit::Meters(_) => "M",
            AltitudeLimit::Ground => "GND",
            AltitudeLimit::Unlimited => "UNL",
        }
    }

    /// Rebuild a limit from a normalized feet value and its original unit tag.
    pub fn from_feet_and_unit(feet: Option<f64>, unit: &str) -> Option<Self> {
        match unit {
            "FT" => feet.map(|f| AltitudeLimit::Feet(f.round() as i32)),
            "FL" => feet.map(|f| AltitudeLimit::FlightLevel((f / 100.0).round() as u16)),
            "M" => feet.map(|f| AltitudeLimit::Meters(f / FEET_PER_METER)),
            "GND" => Some(AltitudeLimit::Ground),
            "UNL" => Some(AltitudeLimit::Unlimited),
            _ => None,
        }
    }
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet / FEET_PER_METER
}

pub fn nm_to_km(nm: f64) -> f64 {
    nm * KM_PER_NM
}

pub fn km_to_nm(km: f64) -> f64 {
    km / KM_PER_NM
}
