//! AIXM coordinate strings and arc rasterization.

use skycheck_core::spatial::{bearing, great_circle_km, offset_by_bearing};
use skycheck_core::units::nm_to_km;

/// Upper bound on vertices generated for one arc or circle.
pub const MAX_ARC_VERTICES: usize = 128;

/// Parse an AIXM DMS coordinate (`DDMMSS.ssN`, `DDDMMSS.ssE`, seconds
/// optional) into decimal degrees. Returns `None` for anything that does
/// not match the profile.
pub fn parse_dms(coord: &str) -> Option<f64> {
    let coord = coord.trim();
    if coord.len() < 3 {
        return None;
    }

    let direction = coord.chars().last()?.to_ascii_uppercase();
    let body = &coord[..coord.len() - 1];

    let (deg_width, max_degrees) = match direction {
        'N' | 'S' => (2usize, 90.0),
        'E' | 'W' => (3usize, 180.0),
        _ => return None,
    };
    if body.len() < deg_width || !body.is_char_boundary(deg_width) {
        return None;
    }

    let degrees: f64 = body[..deg_width].parse().ok()?;
    let rest = &body[deg_width..];

    let (minutes, seconds) = if rest.is_empty() {
        (0.0, 0.0)
    } else if rest.len() >= 2 && rest.is_char_boundary(2) {
        let minutes: f64 = rest[..2].parse().ok()?;
        let tail = &rest[2..];
        if tail.is_empty() {
            (minutes, 0.0)
        } else if let Some(fraction) = tail.strip_prefix('.') {
            // Fractional minutes: DDMM.mmN
            let frac: f64 = format!("0.{fraction}").parse().ok()?;
            (minutes + frac, 0.0)
        } else {
            (minutes, tail.parse().ok()?)
        }
    } else {
        return None;
    };

    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }

    let mut decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if decimal > max_degrees {
        return None;
    }
    if direction == 'S' || direction == 'W' {
        decimal = -decimal;
    }
    Some(decimal)
}

/// Radius as kilometers from an AIXM `valRadiusArc` / `uomRadiusArc` pair.
pub fn radius_km(value: f64, uom: Option<&str>) -> f64 {
    match uom.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("KM") => value,
        Some("M") => value / 1000.0,
        // The dataset publishes radii in nautical miles unless stated.
        _ => nm_to_km(value),
    }
}

/// Rasterize an arc around `center` from `start` to `end` into `(lat, lon)`
/// segments at one vertex per degree of sweep, capped at
/// [`MAX_ARC_VERTICES`]. The end point itself is not emitted (the next
/// boundary vertex supplies it). `end = None` or `end == start` produces a
/// full circle through `start`.
pub fn rasterize_arc(
    start: (f64, f64),
    end: Option<(f64, f64)>,
    center: (f64, f64),
    radius_km: f64,
    clockwise: bool,
) -> Vec<(f64, f64)> {
    // Anchor the radius on the actual start vertex when it is usable, so
    // the rasterized arc joins the boundary without a step.
    let measured = great_circle_km(center.0, center.1, start.0, start.1);
    let radius = if measured > 1e-6 { measured } else { radius_km };
    if radius <= 0.0 {
        return vec![start];
    }

    let start_bearing = bearing(center.0, center.1, start.0, start.1);
    let full_circle = 2.0 * std::f64::consts::PI;

    let sweep = match end {
        None => full_circle,
        Some(end) if great_circle_km(start.0, start.1, end.0, end.1) < 1e-6 => full_circle,
        Some(end) => {
            let end_bearing = bearing(center.0, center.1, end.0, end.1);
            let diff = if clockwise {
                (end_bearing - start_bearing).rem_euclid(full_circle)
            } else {
                (start_bearing - end_bearing).rem_euclid(full_circle)
            };
            if diff < 1e-9 {
                full_circle
            } else {
                diff
            }
        }
    };

    let steps = (sweep.to_degrees().ceil() as usize)
        .clamp(2, MAX_ARC_VERTICES);

    let mut points = Vec::with_capacity(steps);
    for k in 0..steps {
        let fraction = k as f64 / steps as f64;
        let offset = if clockwise {
            sweep * fraction
        } else {
            -sweep * fraction
        };
        points.push(offset_by_bearing(
            center.0,
            center.1,
            radius,
            start_bearing + offset,
        ));
    }
    points
}
