//! R-tree spatial index over airspace bounding boxes.

use geo::{Point, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RStarInsertionStrategy, RTree, RTreeParams, AABB};

/// STR bulk-load parameters; node fan-out 16.
pub struct IndexParams;

impl RTreeParams for IndexParams {
    const MIN_SIZE: usize = 8;
    const MAX_SIZE: usize = 16;
    const REINSERTION_COUNT: usize = 4;
    type DefaultInsertionStrategy = RStarInsertionStrategy;
}

type IndexEntry = GeomWithData<Rectangle<Point<f64>>, i64>;

/// Bounding boxes in (lon, lat), keyed by airspace id. The index never
/// holds raw geometry; stage 2 reloads polygons through the geometry cache.
pub struct SpatialIndex {
    tree: RTree<IndexEntry, IndexParams>,
}

impl SpatialIndex {
    /// Bulk-load (Sort-Tile-Recursive) from `(airspace_id, bbox)` pairs.
    pub fn bulk_load(entries: Vec<(i64, Rect<f64>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(id, rect)| {
                let rectangle = Rectangle::from_corners(
                    Point::new(rect.min().x, rect.min().y),
                    Point::new(rect.max().x, rect.max().y),
                );
                GeomWithData::new(rectangle, id)
            })
            .collect();
        Self {
            tree: RTree::bulk_load_with_params(entries),
        }
    }

    /// Airspace ids whose bounding boxes intersect the query rectangle,
    /// in ascending id order.
    pub fn candidates_in(&self, min: (f64, f64), max: (f64, f64)) -> Vec<i64> {
        let envelope = AABB::from_corners(Point::new(min.0, min.1), Point::new(max.0, max.1));
        let mut ids: Vec<i64> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Rect<f64> {
        Rect::new(
            coord! { x: min_lon, y: min_lat },
            coord! { x: max_lon, y: max_lat },
        )
    }

    #[test]
    fn query_returns_intersecting_boxes_in_id_order() {
        let index = SpatialIndex::bulk_load(vec![
            (3, rect(2.0, 48.0, 3.0, 49.0)),
            (1, rect(2.5, 48.5, 3.5, 49.5)),
            (2, rect(10.0, 40.0, 11.0, 41.0)),
        ]);

        let hits = index.candidates_in((2.6, 48.6), (2.7, 48.7));
        assert_eq!(hits, vec![1, 3]);
    }

    #[test]
    fn disjoint_query_is_empty() {
        let index = SpatialIndex::bulk_load(vec![(1, rect(2.0, 48.0, 3.0, 49.0))]);
        assert!(index.candidates_in((5.0, 50.0), (6.0, 51.0)).is_empty());
    }

    #[test]
    fn bbox_results_are_a_superset_of_exact_hits() {
        // a box touching the query envelope is always returned
        let index = SpatialIndex::bulk_load(vec![(7, rect(2.0, 48.0, 3.0, 49.0))]);
        let hits = index.candidates_in((3.0, 49.0), (4.0, 50.0));
        assert_eq!(hits, vec![7]);
    }
}
