//! The 3-stage airspace crossing query.
//!
//! Stage 1 prunes by bounding box through the R-tree, stage 2 tests exact
//! polygon intersection against the corridor, stage 3 keeps only airspaces
//! whose vertical band overlaps the corridor's altitude interval. Crossing
//! distances and entry/exit altitudes come from flight-path samples.

use std::collections::BTreeSet;
use std::sync::Arc;

use geo::{Area, BooleanOps, BoundingRect, Contains, EuclideanDistance, MultiPolygon, Point};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use skycheck_core::models::{Airspace, Crossing, FlightPath, Waypoint};
use skycheck_core::spatial::great_circle_km;
use skycheck_core::{Corridor, CorridorParams};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::Result;
use crate::geometry::GeometryLoader;
use crate::index::SpatialIndex;
use crate::persistence::{airspaces, Database};

/// Minimum interior intersection area (deg²) for a contact to count as a
/// crossing; polygons touching only at a vertex or edge stay below it.
const MIN_INTERSECTION_AREA_DEG2: f64 = 1e-12;

/// Airspace crossing query engine.
///
/// The spatial index is built lazily on the first query and invalidated by
/// bulk inserts; queries in flight keep their snapshot.
pub struct QueryEngine {
    db: Database,
    loader: GeometryLoader,
    index: RwLock<Option<Arc<SpatialIndex>>>,
    sample_distance_km: f64,
}

/// A point along the flight path with its arc length from the start.
#[derive(Debug, Clone, Copy)]
struct PathSample {
    lat: f64,
    lon: f64,
    alt_ft: f64,
    distance_km: f64,
}

impl QueryEngine {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            db,
            loader: GeometryLoader::new(config.geometry_cache_size),
            index: RwLock::new(None),
            sample_distance_km: config.sample_distance_km.max(0.1),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Drop the index snapshot; the next query rebuilds it.
    pub async fn invalidate_index(&self) {
        *self.index.write().await = None;
    }

    async fn index_snapshot(&self) -> Result<Arc<SpatialIndex>> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }

        let pool = self.db.pool();
        let mut entries = Vec::new();
        for airspace in airspaces::iter_all_with_geometry(pool).await? {
            match self.loader.load(pool, airspace.id).await {
                Ok(geometry) => {
                    if let Some(rect) = geometry.bounding_rect() {
                        entries.push((airspace.id, rect));
                    }
                }
                Err(err) => {
                    warn!("Skipping airspace {} in index build: {}", airspace.id, err)
                }
            }
        }

        let index = Arc::new(SpatialIndex::bulk_load(entries));
        info!("Spatial index built for {} airspaces", index.len());
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Which airspaces does this corridor cross?
    ///
    /// Returns crossings sorted by `(distance_km, airspace_id)` — identical
    /// output for identical inputs.
    pub async fn crossings(
        &self,
        path: &FlightPath,
        params: &CorridorParams,
        cancel: &CancelToken,
    ) -> Result<Vec<Crossing>> {
        cancel.check()?;
        let index = self.index_snapshot().await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }

        // Corridors are built per antimeridian-free sub-path; the altitude
        // interval always spans the whole flight.
        let (alt_lo, alt_hi) = path.altitude_range_ft().unwrap_or((0.0, 0.0));
        let interval = (alt_lo - params.height_ft, alt_hi + params.height_ft);

        let parts = split_at_antimeridian(path.waypoints());
        let mut corridors = Vec::new();
        for part in &parts {
            let sub_path = FlightPath::new(part.clone())
                .map_err(crate::error::Error::InputMalformed)?;
            corridors.push(Corridor::from_path(&sub_path, params));
        }

        cancel.check()?;

        // Stage 1: bounding-box prune over every sub-corridor.
        let mut candidates: BTreeSet<i64> = BTreeSet::new();
        for corridor in &corridors {
            if let Some(rect) = corridor.polygon.bounding_rect() {
                candidates.extend(index.candidates_in(
                    (rect.min().x, rect.min().y),
                    (rect.max().x, rect.max().y),
                ));
            }
        }
        debug!("Stage 1 (bbox): {} candidate(s)", candidates.len());

        // Samples follow the split parts so longitudes stay continuous
        // around the antimeridian; arc lengths accumulate across parts.
        let mut samples: Vec<PathSample> = Vec::new();
        let mut base_km = 0.0;
        for part in &parts {
            let part_samples = sample_path(part, self.sample_distance_km);
            let part_length = part_samples.last().map(|s| s.distance_km).unwrap_or(0.0);
            samples.extend(part_samples.into_iter().map(|mut s| {
                s.distance_km += base_km;
                s
            }));
            base_km += part_length;
        }
        let pool = self.db.pool();
        let mut crossings = Vec::new();

        for id in candidates {
            cancel.check()?;

            // Per-candidate geometry failures are recorded and skipped;
            // they never fail the query.
            let geometry = match self.loader.load(pool, id).await {
                Ok(geometry) => geometry,
                Err(err) => {
                    warn!("Skipping candidate airspace {}: {}", id, err);
                    continue;
                }
            };

            // Stage 2: exact interior intersection.
            let intersects = corridors.iter().any(|corridor| {
                corridor
                    .polygon
                    .intersection(&geometry)
                    .unsigned_area()
                    > MIN_INTERSECTION_AREA_DEG2
            });
            if !intersects {
                continue;
            }

            let Some(airspace) = airspaces::get_by_id(pool, id).await? else {
                continue;
            };

            // Stage 3: closed-interval altitude overlap.
            let (band_lo, band_hi) = airspace.altitude_band_ft();
            if !(interval.0 <= band_hi && band_lo <= interval.1) {
                continue;
            }

            crossings.push(build_crossing(&airspace, &geometry, &samples));
        }

        crossings.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.airspace_id.cmp(&b.airspace_id))
        });

        debug!("Stages 2+3: {} crossing(s)", crossings.len());
        Ok(crossings)
    }
}

fn build_crossing(
    airspace: &Airspace,
    geometry: &MultiPolygon<f64>,
    samples: &[PathSample],
) -> Crossing {
    let inside: Vec<&PathSample> = samples
        .iter()
        .filter(|s| geometry.contains(&Point::new(s.lon, s.lat)))
        .collect();

    let (entry, exit) = if let (Some(first), Some(last)) = (inside.first(), inside.last()) {
        (**first, **last)
    } else {
        // Corridor-only contact: the nominal path never enters the polygon.
        // Report the nearest-approach sample.
        let distance_to = |s: &PathSample| {
            let point = Point::new(s.lon, s.lat);
            geometry
                .0
                .iter()
                .map(|poly| point.euclidean_distance(poly))
                .fold(f64::INFINITY, f64::min)
        };
        let nearest = samples
            .iter()
            .min_by(|a, b| {
                distance_to(a)
                    .partial_cmp(&distance_to(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
            .unwrap_or(PathSample {
                lat: 0.0,
                lon: 0.0,
                alt_ft: 0.0,
                distance_km: 0.0,
            });
        (nearest, nearest)
    };

    let (band_lo, band_hi) = airspace.altitude_band_ft();

    Crossing {
        airspace_id: airspace.id,
        code_id: airspace.code_id.clone(),
        name: airspace.name.clone(),
        airspace_type: airspace.code_type,
        airspace_class: airspace.airspace_class,
        min_alt_ft: airspace.min_altitude.map(|_| band_lo),
        max_alt_ft: airspace
            .max_altitude
            .map(|_| band_hi)
            .filter(|v| v.is_finite()),
        distance_km: entry.distance_km,
        entry_alt_ft: entry.alt_ft,
        exit_alt_ft: exit.alt_ft,
        critical: airspace.is_critical(),
    }
}

/// Interpolate the flight path at roughly `step_km` spacing. Every
/// waypoint is itself a sample; altitudes interpolate linearly with the
/// great-circle arc length as the parameter.
fn sample_path(waypoints: &[Waypoint], step_km: f64) -> Vec<PathSample> {
    let mut samples = Vec::new();
    let mut travelled = 0.0;

    for pair in waypoints.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let seg_km = great_circle_km(a.lat, a.lon, b.lat, b.lon);
        let steps = (seg_km / step_km).ceil().max(1.0) as usize;

        for k in 0..steps {
            let fraction = k as f64 / steps as f64;
            samples.push(PathSample {
                lat: a.lat + (b.lat - a.lat) * fraction,
                lon: a.lon + (b.lon - a.lon) * fraction,
                alt_ft: interpolate_alt(a.altitude_ft, b.altitude_ft, fraction),
                distance_km: travelled + seg_km * fraction,
            });
        }
        travelled += seg_km;
    }

    if let Some(last) = waypoints.last() {
        samples.push(PathSample {
            lat: last.lat,
            lon: last.lon,
            alt_ft: last.altitude_ft,
            distance_km: travelled,
        });
    }
    samples
}

fn interpolate_alt(a: f64, b: f64, fraction: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a + (b - a) * fraction,
        (false, true) => a,
        (true, false) => b,
        (true, true) => f64::NAN,
    }
}

/// Split a waypoint sequence wherever a segment jumps across the ±180°
/// meridian, inserting boundary waypoints on each side so both
/// sub-corridors stay in a continuous longitude frame.
fn split_at_antimeridian(waypoints: &[Waypoint]) -> Vec<Vec<Waypoint>> {
    let mut parts: Vec<Vec<Waypoint>> = Vec::new();
    let mut current: Vec<Waypoint> = vec![waypoints[0].clone()];

    for pair in waypoints.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if (b.lon - a.lon).abs() > 180.0 {
            // Unwrap b's longitude next to a's, find the latitude where the
            // segment meets ±180, and cut there.
            let unwrapped_b = if a.lon > 0.0 { b.lon + 360.0 } else { b.lon - 360.0 };
            let edge = if a.lon > 0.0 { 180.0 } else { -180.0 };
            let span = unwrapped_b - a.lon;
            let fraction = if span.abs() < f64::EPSILON {
                0.0
            } else {
                (edge - a.lon) / span
            };
            let cut_lat = a.lat + (b.lat - a.lat) * fraction;
            let cut_alt = interpolate_alt(a.altitude_ft, b.altitude_ft, fraction);

            current.push(Waypoint::new("", cut_lat, edge, cut_alt));
            if current.len() >= 2 {
                parts.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            current.push(Waypoint::new("", cut_lat, -edge, cut_alt));
        }
        current.push(b.clone());
    }

    if !current.is_empty() {
        parts.push(current);
    }

    // A path that starts or ends exactly on the meridian can leave
    // zero-length stubs behind; drop them.
    for part in &mut parts {
        part.dedup_by(|a, b| a.lat == b.lat && a.lon == b.lon);
    }
    parts.retain(|part| part.len() >= 2);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(lat: f64, lon: f64, alt: f64) -> Waypoint {
        Waypoint::new("", lat, lon, alt)
    }

    #[test]
    fn plain_paths_stay_in_one_part() {
        let parts = split_at_antimeridian(&[wp(48.0, 2.0, 1000.0), wp(49.0, 3.0, 1000.0)]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 2);
    }

    #[test]
    fn antimeridian_segment_splits_into_two_parts() {
        let parts = split_at_antimeridian(&[wp(0.0, 179.0, 1000.0), wp(0.0, -179.0, 1000.0)]);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].last().unwrap().lon, 180.0);
        assert_eq!(parts[1].first().unwrap().lon, -180.0);
    }

    #[test]
    fn samples_cover_the_whole_path() {
        let samples = sample_path(&[wp(48.0, 2.0, 1000.0), wp(48.0, 3.0, 2000.0)], 5.0);
        assert!(samples.len() > 10);
        assert_eq!(samples.first().unwrap().distance_km, 0.0);
        assert!((samples.last().unwrap().alt_ft - 2000.0).abs() < 1e-9);
        // monotonic distances
        for pair in samples.windows(2) {
            assert!(pair[1].distance_km >= pair[0].distance_km);
        }
    }

    #[test]
    fn altitude_interpolation_skips_flagged_values() {
        assert_eq!(interpolate_alt(1000.0, f64::NAN, 0.5), 1000.0);
        assert_eq!(interpolate_alt(f64::NAN, 2000.0, 0.5), 2000.0);
        assert!((interpolate_alt(1000.0, 2000.0, 0.25) - 1250.0).abs() < 1e-9);
    }
}
