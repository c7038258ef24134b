//! Profile correction end-to-end: oracle, corrector, KML output.

use async_trait::async_trait;
use skycheck_core::profile::BranchAction;
use skycheck_core::{FlightPath, ProfileParams, Waypoint};
use skycheck_engine::config::Config;
use skycheck_engine::corrector::correct_flight_path;
use skycheck_engine::elevation::ElevationOracle;
use skycheck_engine::kml;

/// Two airfields with different elevations, matched by latitude.
struct TwoFields;

#[async_trait]
impl ElevationOracle for TwoFields {
    async fn elevation_m(&self, lat: f64, _lon: f64) -> skycheck_engine::Result<f64> {
        // departure ~79 ft, arrival ~548 ft
        if lat > 48.7 {
            Ok(24.08)
        } else {
            Ok(167.03)
        }
    }
}

fn route() -> FlightPath {
    FlightPath::new(vec![
        Waypoint::new("W1", 48.9986, 1.9417, 0.0),
        Waypoint::new("W2", 48.5, 1.9417, 1400.0),
        Waypoint::new("W3", 48.0, 1.9417, 0.0),
    ])
    .unwrap()
}

#[tokio::test]
async fn flat_request_gets_an_initial_climb() {
    let config = Config::default();
    let profile = correct_flight_path(&route(), &ProfileParams::default(), &TwoFields, &config)
        .await
        .unwrap();

    // 79 ft field + 1000 ft
    let first = profile.path.waypoints().first().unwrap();
    assert!((first.altitude_ft - 1079.0).abs() <= 1.0);

    assert!(profile
        .path
        .waypoints()
        .iter()
        .any(|w| w.id == "Climb_W1_1400"));

    let table = &profile.branches;
    assert_eq!(table[0].action, BranchAction::Climb);
    assert!(!table[0].unreachable);
    assert!(!profile.elevation_estimated);
}

#[tokio::test]
async fn corrected_profile_survives_a_kml_round_trip() {
    let config = Config::default();
    let profile = correct_flight_path(&route(), &ProfileParams::default(), &TwoFields, &config)
        .await
        .unwrap();

    let kml_out = kml::write_corrected(&profile.path, "corrected").unwrap();
    let reparsed = kml::parse_str(&kml_out).unwrap();

    assert_eq!(reparsed.len(), profile.path.len());
    for (a, b) in profile.path.waypoints().iter().zip(reparsed.waypoints()) {
        assert_eq!(a.id, b.id);
        assert!((a.lat - b.lat).abs() < 1e-7);
        assert!((a.lon - b.lon).abs() < 1e-7);
        // altitude goes through a meters round trip
        assert!((a.altitude_ft - b.altitude_ft).abs() < 0.1);
    }
}

#[tokio::test]
async fn reparsing_and_recorrecting_is_idempotent() {
    let config = Config::default();
    let params = ProfileParams::default();
    let once = correct_flight_path(&route(), &params, &TwoFields, &config)
        .await
        .unwrap();

    let kml_out = kml::write_corrected(&once.path, "corrected").unwrap();
    let reparsed = kml::parse_str(&kml_out).unwrap();
    let twice = correct_flight_path(&reparsed, &params, &TwoFields, &config)
        .await
        .unwrap();

    assert_eq!(once.path.len(), twice.path.len());
    for (a, b) in once.path.waypoints().iter().zip(twice.path.waypoints()) {
        assert_eq!(a.id, b.id);
        assert!((a.lat - b.lat).abs() < 1e-6);
        assert!((a.lon - b.lon).abs() < 1e-6);
        assert!((a.altitude_ft - b.altitude_ft).abs() < 0.1);
    }
}
