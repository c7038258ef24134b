//! Polyline buffering: the lateral corridor polygon.

use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};

use crate::spatial::{meters_per_deg_lat, meters_per_deg_lon};
use crate::units::nm_to_km;

/// Segments per quarter turn for round caps and joins.
const ARC_SEGMENTS_PER_QUARTER: usize = 8;

/// Buffer a polyline of `(lat, lon)` points by `width_nm` nautical miles.
///
/// Approximates the Minkowski sum of the polyline with a disc: each segment
/// becomes a capsule (rectangle plus round caps) in a locally flat frame
/// anchored at the polyline centroid, and the capsules are unioned. Round
/// joins fall out of the overlapping caps. The result is in geographic
/// `(lon, lat)` coordinates.
pub fn buffer_polyline(points: &[(f64, f64)], width_nm: f64) -> MultiPolygon<f64> {
    if points.is_empty() || width_nm <= 0.0 {
        return MultiPolygon::new(vec![]);
    }

    let frame = LocalFrame::anchored_at_centroid(points);
    let radius_m = nm_to_km(width_nm) * 1000.0;

    let projected: Vec<(f64, f64)> = points.iter().map(|&(lat, lon)| frame.project(lat, lon)).collect();

    let mut capsules: Vec<Polygon<f64>> = Vec::new();
    if projected.len() == 1 {
        capsules.push(disc(projected[0], radius_m));
    } else {
        for pair in projected.windows(2) {
            capsules.push(capsule(pair[0], pair[1], radius_m));
        }
    }

    let mut merged = MultiPolygon::new(vec![capsules[0].clone()]);
    for capsule in &capsules[1..] {
        merged = merged.union(&MultiPolygon::new(vec![capsule.clone()]));
    }

    MultiPolygon::new(
        merged
            .into_iter()
            .map(|poly| frame.unproject_polygon(&poly))
            .collect(),
    )
}

/// Locally flat projection around an anchor point, meters east/north.
struct LocalFrame {
    anchor_lat: f64,
    anchor_lon: f64,
    m_per_deg_lat: f64,
    m_per_deg_lon: f64,
}

impl LocalFrame {
    fn anchored_at_centroid(points: &[(f64, f64)]) -> Self {
        let n = points.len() as f64;
        let anchor_lat = points.iter().map(|p| p.0).sum::<f64>() / n;
        let anchor_lon = points.iter().map(|p| p.1).sum::<f64>() / n;
        Self {
            anchor_lat,
            anchor_lon,
            m_per_deg_lat: meters_per_deg_lat(anchor_lat),
            m_per_deg_lon: meters_per_deg_lon(anchor_lat).max(1e-9),
        }
    }

    fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            (lon - self.anchor_lon) * self.m_per_deg_lon,
            (lat - self.anchor_lat) * self.m_per_deg_lat,
        )
    }

    fn unproject(&self, x: f64, y: f64) -> Coord<f64> {
        Coord {
            x: self.anchor_lon + x / self.m_per_deg_lon,
            y: self.anchor_lat + y / self.m_per_deg_lat,
        }
    }

    fn unproject_polygon(&self, poly: &Polygon<f64>) -> Polygon<f64> {
        let exterior: Vec<Coord<f64>> = poly
            .exterior()
            .coords()
            .map(|c| self.unproject(c.x, c.y))
            .collect();
        let interiors: Vec<LineString<f64>> = poly
            .interiors()
            .iter()
            .map(|ring| {
                LineString::new(ring.coords().map(|c| self.unproject(c.x, c.y)).collect())
            })
            .collect();
        Polygon::new(LineString::new(exterior), interiors)
    }
}

fn arc(center: (f64, f64), radius: f64, start_angle: f64, sweep: f64, out: &mut Vec<Coord<f64>>) {
    let quarters = (sweep.abs() / std::f64::consts::FRAC_PI_2).ceil().max(1.0);
    let steps = (quarters as usize * ARC_SEGMENTS_PER_QUARTER).max(1);
    for k in 0..=steps {
        let a = start_angle + sweep * k as f64 / steps as f64;
        out.push(Coord {
            x: center.0 + radius * a.cos(),
            y: center.1 + radius * a.sin(),
        });
    }
}

fn disc(center: (f64, f64), radius: f64) -> Polygon<f64> {
    let mut coords = Vec::new();
    arc(center, radius, 0.0, 2.0 * std::f64::consts::PI, &mut coords);
    Polygon::new(LineString::new(coords), vec![])
}

/// Rectangle with semicircular end caps around a segment.
fn capsule(start: (f64, f64), end: (f64, f64), radius: f64) -> Polygon<f64> {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    if dx.hypot(dy) <= f64::EPSILON {
        return disc(start, radius);
    }
    let heading = dy.atan2(dx);
    let left = heading + std::f64::consts::FRAC_PI_2;

    // Counter-clockwise exterior ring: near cap sweeping behind the start,
    // then the far cap sweeping ahead of the end.
    let mut coords = Vec::new();
    arc(start, radius, left, std::f64::consts::PI, &mut coords);
    arc(end, radius, left + std::f64::consts::PI, std::f64::consts::PI, &mut coords);
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    Polygon::new(LineString::new(coords), vec![])
}
