//! Polygon assembly from stored boundary vertices, with an LRU cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use geo::{Area, Coord, LineString, MultiPolygon, Polygon};
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::persistence::{airspaces, BorderRecord};

/// Two vertices closer than this (degrees) are the same point.
const CLOSURE_EPSILON_DEG: f64 = 1e-7;
/// Rings with less oriented area than this (deg²) are degenerate.
const MIN_RING_AREA_DEG2: f64 = 1e-12;

/// Assembles and caches airspace polygons.
///
/// Entries are immutable once built; eviction is strictly least recently
/// used. The cache is internally synchronized, so one loader is shared by
/// all concurrent queries.
pub struct GeometryLoader {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<i64, CacheSlot>,
    tick: u64,
}

struct CacheSlot {
    geometry: Arc<MultiPolygon<f64>>,
    last_used: u64,
}

impl GeometryLoader {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Load the assembled polygon for an airspace, hitting the cache first.
    pub async fn load(&self, pool: &SqlitePool, airspace_id: i64) -> Result<Arc<MultiPolygon<f64>>> {
        if let Some(hit) = self.cache_get(airspace_id) {
            return Ok(hit);
        }

        let borders = airspaces::load_geometry(pool, airspace_id).await?;
        let assembled = assemble_polygons(&borders);
        if assembled.0.is_empty() {
            return Err(Error::Internal(format!(
                "airspace {airspace_id} has no usable boundary"
            )));
        }

        let geometry = Arc::new(assembled);
        self.cache_put(airspace_id, Arc::clone(&geometry));
        Ok(geometry)
    }

    pub fn cached_len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    fn cache_get(&self, id: i64) -> Option<Arc<MultiPolygon<f64>>> {
        let mut state = self.state.lock().unwrap();
        state.tick += 1;
        let tick = state.tick;
        state.entries.get_mut(&id).map(|slot| {
            slot.last_used = tick;
            Arc::clone(&slot.geometry)
        })
    }

    fn cache_put(&self, id: i64, geometry: Arc<MultiPolygon<f64>>) {
        let mut state = self.state.lock().unwrap();
        state.tick += 1;
        let tick = state.tick;
        state.entries.insert(
            id,
            CacheSlot {
                geometry,
                last_used: tick,
            },
        );

        while state.entries.len() > self.capacity {
            if let Some((&oldest, _)) = state
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
            {
                state.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

/// Assemble border records into polygon components.
///
/// Borders come pre-sorted by ordinal, vertices within each border too. A
/// border whose endpoints coincide (within 1e-7°) is already closed;
/// otherwise the first vertex is appended. Rings below the area floor or
/// with fewer than 3 distinct vertices are discarded.
pub fn assemble_polygons(borders: &[BorderRecord]) -> MultiPolygon<f64> {
    let mut components = Vec::new();

    for border in borders {
        let mut coords: Vec<Coord<f64>> = border
            .vertices
            .iter()
            .map(|v| Coord { x: v.lon, y: v.lat })
            .collect();

        // Drop consecutive duplicates before judging the ring.
        coords.dedup_by(|a, b| {
            (a.x - b.x).abs() < CLOSURE_EPSILON_DEG && (a.y - b.y).abs() < CLOSURE_EPSILON_DEG
        });

        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            let closed = (first.x - last.x).abs() < CLOSURE_EPSILON_DEG
                && (first.y - last.y).abs() < CLOSURE_EPSILON_DEG;
            if closed {
                coords.pop();
            }
        }

        if coords.len() < 3 {
            continue;
        }
        // Close the ring back onto the first vertex.
        coords.push(coords[0]);

        let polygon = Polygon::new(LineString::new(coords), vec![]);
        if polygon.signed_area().abs() < MIN_RING_AREA_DEG2 {
            continue;
        }
        components.push(polygon);
    }

    MultiPolygon::new(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycheck_core::models::Vertex;

    fn border(points: &[(f64, f64)]) -> BorderRecord {
        BorderRecord {
            ordinal: 0,
            vertices: points
                .iter()
                .enumerate()
                .map(|(i, &(lat, lon))| Vertex {
                    ordinal: i as i64,
                    lat,
                    lon,
                })
                .collect(),
        }
    }

    #[test]
    fn open_ring_is_closed_back_to_the_first_vertex() {
        let assembled = assemble_polygons(&[border(&[
            (48.0, 2.0),
            (49.0, 2.0),
            (49.0, 3.0),
            (48.0, 3.0),
        ])]);

        assert_eq!(assembled.0.len(), 1);
        let exterior = assembled.0[0].exterior();
        assert_eq!(exterior.coords().next(), exterior.coords().last());
        // ring has >= 3 distinct vertices
        assert!(exterior.coords().count() >= 4);
    }

    #[test]
    fn already_closed_ring_is_not_doubled() {
        let assembled = assemble_polygons(&[border(&[
            (48.0, 2.0),
            (49.0, 2.0),
            (49.0, 3.0),
            (48.0, 2.0),
        ])]);
        assert_eq!(assembled.0.len(), 1);
        assert_eq!(assembled.0[0].exterior().coords().count(), 4);
    }

    #[test]
    fn degenerate_rings_are_discarded() {
        // two distinct vertices only
        let line = assemble_polygons(&[border(&[(48.0, 2.0), (49.0, 2.0)])]);
        assert!(line.0.is_empty());

        // zero-area sliver
        let sliver = assemble_polygons(&[border(&[
            (48.0, 2.0),
            (49.0, 2.0),
            (48.5, 2.0),
        ])]);
        assert!(sliver.0.is_empty());
    }

    #[test]
    fn multiple_borders_become_multiple_components() {
        let assembled = assemble_polygons(&[
            border(&[(48.0, 2.0), (48.1, 2.0), (48.1, 2.1), (48.0, 2.1)]),
            border(&[(50.0, 4.0), (50.1, 4.0), (50.1, 4.1), (50.0, 4.1)]),
        ]);
        assert_eq!(assembled.0.len(), 2);
    }

    #[test]
    fn lru_evicts_the_least_recently_used_entry() {
        let loader = GeometryLoader::new(2);
        let square = Arc::new(assemble_polygons(&[border(&[
            (48.0, 2.0),
            (48.1, 2.0),
            (48.1, 2.1),
            (48.0, 2.1),
        ])]));

        loader.cache_put(1, Arc::clone(&square));
        loader.cache_put(2, Arc::clone(&square));
        // touch 1 so 2 becomes the eviction victim
        assert!(loader.cache_get(1).is_some());
        loader.cache_put(3, Arc::clone(&square));

        assert_eq!(loader.cached_len(), 2);
        assert!(loader.cache_get(2).is_none());
        assert!(loader.cache_get(1).is_some());
        assert!(loader.cache_get(3).is_some());
    }
}
