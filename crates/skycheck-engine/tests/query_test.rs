//! Corridor query scenarios against an in-memory store.

use skycheck_core::models::{AirspaceType, FlightPath, Waypoint};
use skycheck_core::units::AltitudeLimit;
use skycheck_core::CorridorParams;
use skycheck_engine::cancel::CancelToken;
use skycheck_engine::config::Config;
use skycheck_engine::persistence::{self, airspaces, AirspaceRecord, BorderRecord, Database};
use skycheck_engine::query::QueryEngine;

use skycheck_core::models::{Airspace, Vertex};

async fn database_with(records: &[AirspaceRecord]) -> Database {
    let db = persistence::init_database(":memory:", 1).await.unwrap();
    airspaces::bulk_insert(db.pool(), records).await.unwrap();
    db
}

fn engine_for(db: Database) -> QueryEngine {
    QueryEngine::new(db, &Config::default())
}

fn square_record(
    code_id: &str,
    code_type: AirspaceType,
    class: Option<char>,
    (lat_min, lat_max): (f64, f64),
    (lon_min, lon_max): (f64, f64),
    (alt_min, alt_max): (AltitudeLimit, AltitudeLimit),
) -> AirspaceRecord {
    let corners = [
        (lat_min, lon_min),
        (lat_max, lon_min),
        (lat_max, lon_max),
        (lat_min, lon_max),
    ];
    AirspaceRecord {
        airspace: Airspace {
            id: 0,
            code_id: code_id.to_string(),
            code_type,
            airspace_class: class,
            name: code_id.to_string(),
            min_altitude: Some(alt_min),
            max_altitude: Some(alt_max),
            operating_hours: None,
            remarks: None,
        },
        borders: vec![BorderRecord {
            ordinal: 0,
            vertices: corners
                .iter()
                .enumerate()
                .map(|(i, &(lat, lon))| Vertex {
                    ordinal: i as i64,
                    lat,
                    lon,
                })
                .collect(),
        }],
    }
}

fn short_hop(alt_ft: f64) -> FlightPath {
    FlightPath::new(vec![
        Waypoint::new("A", 48.5, 2.5, alt_ft),
        Waypoint::new("B", 48.5, 2.5001, alt_ft),
    ])
    .unwrap()
}

#[tokio::test]
async fn empty_dataset_yields_no_crossings() {
    let engine = engine_for(database_with(&[]).await);
    let crossings = engine
        .crossings(
            &short_hop(1000.0),
            &CorridorParams::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert!(crossings.is_empty());
}

#[tokio::test]
async fn contained_corridor_reports_exactly_one_crossing_at_zero() {
    let record = square_record(
        "LFTEST",
        AirspaceType::Tma,
        Some('D'),
        (48.0, 49.0),
        (2.0, 3.0),
        (AltitudeLimit::Feet(0), AltitudeLimit::Feet(2000)),
    );
    let engine = engine_for(database_with(&[record]).await);

    let params = CorridorParams {
        width_nm: 1.0,
        height_ft: 500.0,
    };
    let crossings = engine
        .crossings(&short_hop(1000.0), &params, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(crossings.len(), 1);
    let crossing = &crossings[0];
    assert_eq!(crossing.code_id, "LFTEST");
    assert_eq!(crossing.distance_km, 0.0);
    assert_eq!(crossing.entry_alt_ft, 1000.0);
    assert!(!crossing.critical);
}

#[tokio::test]
async fn altitude_miss_filters_the_airspace_out() {
    let record = square_record(
        "LFTEST",
        AirspaceType::Tma,
        None,
        (48.0, 49.0),
        (2.0, 3.0),
        (AltitudeLimit::Feet(0), AltitudeLimit::Feet(2000)),
    );
    let engine = engine_for(database_with(&[record]).await);

    let params = CorridorParams {
        width_nm: 1.0,
        height_ft: 100.0,
    };
    let crossings = engine
        .crossings(&short_hop(3000.0), &params, &CancelToken::new())
        .await
        .unwrap();
    assert!(crossings.is_empty());
}

#[tokio::test]
async fn unlimited_ceiling_is_reported_regardless_of_corridor_top() {
    let record = square_record(
        "LFUNL",
        AirspaceType::Cta,
        None,
        (48.0, 49.0),
        (2.0, 3.0),
        (AltitudeLimit::Feet(1000), AltitudeLimit::Unlimited),
    );
    let engine = engine_for(database_with(&[record]).await);

    let crossings = engine
        .crossings(
            &short_hop(45000.0),
            &CorridorParams::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].max_alt_ft, None);
}

#[tokio::test]
async fn class_a_crossing_is_critical() {
    let record = square_record(
        "LFTMAA",
        AirspaceType::Tma,
        Some('A'),
        (48.0, 49.0),
        (2.0, 3.0),
        (AltitudeLimit::Feet(0), AltitudeLimit::FlightLevel(195)),
    );
    let engine = engine_for(database_with(&[record]).await);

    let crossings = engine
        .crossings(
            &short_hop(1000.0),
            &CorridorParams::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(crossings.len(), 1);
    assert!(crossings[0].critical);
}

#[tokio::test]
async fn antimeridian_corridor_is_split_and_merged() {
    let record = square_record(
        "LFMERID",
        AirspaceType::Danger,
        None,
        (-0.1, 0.1),
        (179.8, 180.0),
        (AltitudeLimit::Feet(0), AltitudeLimit::Feet(5000)),
    );
    let engine = engine_for(database_with(&[record]).await);

    let path = FlightPath::new(vec![
        Waypoint::new("A", 0.0, 179.0, 1000.0),
        Waypoint::new("B", 0.0, -179.0, 1000.0),
    ])
    .unwrap();

    let crossings = engine
        .crossings(&path, &CorridorParams::default(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].code_id, "LFMERID");
}

#[tokio::test]
async fn corridor_stopping_short_of_the_boundary_is_not_a_crossing() {
    // Airspace east of lon 3.0; the 1 NM corridor cap around a path ending
    // at 2.95 stays short of it, so no interior intersection exists.
    let record = square_record(
        "LFEDGE",
        AirspaceType::Danger,
        None,
        (48.0, 49.0),
        (3.0, 4.0),
        (AltitudeLimit::Feet(0), AltitudeLimit::Feet(5000)),
    );
    let engine = engine_for(database_with(&[record]).await);

    let path = FlightPath::new(vec![
        Waypoint::new("A", 48.5, 2.0, 1000.0),
        Waypoint::new("B", 48.5, 2.95, 1000.0),
    ])
    .unwrap();
    let params = CorridorParams {
        width_nm: 1.0,
        height_ft: 500.0,
    };

    let crossings = engine
        .crossings(&path, &params, &CancelToken::new())
        .await
        .unwrap();
    assert!(crossings.is_empty());
}

#[tokio::test]
async fn results_are_deterministic_and_ordered() {
    let records = vec![
        square_record(
            "LFNEAR",
            AirspaceType::Tma,
            None,
            (48.0, 48.6),
            (2.0, 2.6),
            (AltitudeLimit::Feet(0), AltitudeLimit::Feet(5000)),
        ),
        square_record(
            "LFFAR",
            AirspaceType::Ctr,
            None,
            (48.0, 48.6),
            (3.4, 4.0),
            (AltitudeLimit::Feet(0), AltitudeLimit::Feet(5000)),
        ),
    ];
    let engine = engine_for(database_with(&records).await);

    let path = FlightPath::new(vec![
        Waypoint::new("A", 48.3, 2.1, 1000.0),
        Waypoint::new("B", 48.3, 3.9, 1000.0),
    ])
    .unwrap();

    let first = engine
        .crossings(&path, &CorridorParams::default(), &CancelToken::new())
        .await
        .unwrap();
    let second = engine
        .crossings(&path, &CorridorParams::default(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].code_id, "LFNEAR");
    assert!(first[0].distance_km <= first[1].distance_km);

    let a = skycheck_engine::analysis::crossings_to_json(&first).unwrap();
    let b = skycheck_engine::analysis::crossings_to_json(&second).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn bulk_updates_take_effect_after_index_invalidation() {
    let db = database_with(&[]).await;
    let engine = engine_for(db.clone());

    let before = engine
        .crossings(
            &short_hop(1000.0),
            &CorridorParams::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert!(before.is_empty());

    let record = square_record(
        "LFLATE",
        AirspaceType::Ctr,
        None,
        (48.0, 49.0),
        (2.0, 3.0),
        (AltitudeLimit::Feet(0), AltitudeLimit::Feet(2000)),
    );
    airspaces::bulk_insert(db.pool(), &[record]).await.unwrap();
    engine.invalidate_index().await;

    let after = engine
        .crossings(
            &short_hop(1000.0),
            &CorridorParams::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].code_id, "LFLATE");
}

#[tokio::test]
async fn cancelled_queries_bail_out() {
    let engine = engine_for(database_with(&[]).await);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = engine
        .crossings(&short_hop(1000.0), &CorridorParams::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, skycheck_engine::Error::Cancelled));
}
