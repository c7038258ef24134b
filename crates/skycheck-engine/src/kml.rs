//! KML flight-path input and corrected-profile output.
//!
//! Input is either a sequence of `Placemark/Point` waypoints (a planned
//! route) or a single `LineString` with many points (a GPS trace). KML
//! altitudes are meters MSL and are converted to feet on the way in; a
//! missing altitude component becomes `NaN` and is left for the profile
//! corrector to resolve.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::info;

use skycheck_core::profile::is_transition_waypoint;
use skycheck_core::units::{feet_to_meters, meters_to_feet};
use skycheck_core::{FlightPath, Waypoint};

use crate::error::{Error, Result};

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
/// More points than this means a GPS trace rather than a planned route.
const TRACE_THRESHOLD: usize = 50;
/// Traces are thinned to roughly this many points before analysis.
const TRACE_TARGET_POINTS: usize = 1000;

pub fn parse_file(path: &Path) -> Result<FlightPath> {
    let data = std::fs::read_to_string(path)?;
    parse_str(&data)
}

/// Parse a KML document into a flight path.
pub fn parse_str(data: &str) -> Result<FlightPath> {
    let mut xml = Reader::from_reader(data.as_bytes());
    xml.config_mut().trim_text(true);

    struct Placemark {
        name: Option<String>,
        point_coords: Option<String>,
        line_coords: Option<String>,
    }

    let mut placemarks: Vec<Placemark> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<Placemark> = None;

    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "Placemark" {
                    current = Some(Placemark {
                        name: None,
                        point_coords: None,
                        line_coords: None,
                    });
                }
                stack.push(name);
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("Placemark") {
                    if let Some(placemark) = current.take() {
                        placemarks.push(placemark);
                    }
                }
            }
            Event::Text(t) => {
                let Some(placemark) = current.as_mut() else {
                    buf.clear();
                    continue;
                };
                let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                let leaf = stack.last().map(String::as_str).unwrap_or("");
                let parent = stack
                    .len()
                    .checked_sub(2)
                    .map(|i| stack[i].as_str())
                    .unwrap_or("");
                match (parent, leaf) {
                    ("Placemark", "name") => placemark.name = Some(text),
                    ("Point", "coordinates") => placemark.point_coords = Some(text),
                    ("LineString", "coordinates") => placemark.line_coords = Some(text),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // Route: one waypoint per Placemark/Point, named from the Placemark.
    let mut waypoints: Vec<Waypoint> = Vec::new();
    for placemark in &placemarks {
        let Some(coords) = placemark.point_coords.as_deref() else {
            continue;
        };
        if let Some(&(lon, lat, alt_ft)) = parse_coordinates(coords).first() {
            let id = placemark.name.clone().unwrap_or_default();
            waypoints.push(Waypoint::new(id, lat, lon, alt_ft));
        }
    }

    if waypoints.len() >= 2 {
        info!("Parsed flight route with {} waypoint(s)", waypoints.len());
        return FlightPath::new(waypoints).map_err(Error::InputMalformed);
    }

    // Trace: a single LineString with many points, ids synthesized.
    let line = placemarks
        .iter()
        .find_map(|p| p.line_coords.as_deref())
        .ok_or_else(|| {
            Error::InputMalformed("KML carries neither route waypoints nor a LineString".into())
        })?;

    let mut points = parse_coordinates(line);
    if points.len() > TRACE_THRESHOLD {
        let factor = (points.len() / TRACE_TARGET_POINTS).max(1);
        if factor > 1 {
            let last = points.last().copied();
            points = points.into_iter().step_by(factor).collect();
            if let Some(last) = last {
                let last_kept = points
                    .last()
                    .map(|p| p.0 == last.0 && p.1 == last.1)
                    .unwrap_or(false);
                if !last_kept {
                    points.push(last);
                }
            }
        }
        info!("Parsed flight trace, thinned to {} point(s)", points.len());
    } else {
        info!("Parsed flight path with {} point(s)", points.len());
    }

    let waypoints: Vec<Waypoint> = points
        .into_iter()
        .enumerate()
        .map(|(i, (lon, lat, alt_ft))| Waypoint::new(format!("TRK_{:04}", i + 1), lat, lon, alt_ft))
        .collect();

    FlightPath::new(waypoints).map_err(Error::InputMalformed)
}

/// Parse a KML `coordinates` block: whitespace-separated `lon,lat,alt`
/// triplets, or one comma-separated stream of values. Altitudes convert
/// from meters to feet; a missing altitude becomes `NaN`.
fn parse_coordinates(text: &str) -> Vec<(f64, f64, f64)> {
    let cleaned = text.trim();
    let mut out = Vec::new();

    let tuples: Vec<&str> = cleaned.split_whitespace().collect();
    if tuples.len() > 1 || cleaned.matches(',').count() <= 2 {
        for tuple in tuples {
            let parts: Vec<&str> = tuple.split(',').collect();
            if let Some(point) = triplet(&parts) {
                out.push(point);
            }
        }
    } else {
        // "lon,lat,alt,lon,lat,alt,..." on one line
        let parts: Vec<&str> = cleaned.split(',').map(str::trim).collect();
        for chunk in parts.chunks(3) {
            if let Some(point) = triplet(chunk) {
                out.push(point);
            }
        }
    }
    out
}

fn triplet(parts: &[&str]) -> Option<(f64, f64, f64)> {
    if parts.len() < 2 {
        return None;
    }
    let lon: f64 = parts[0].trim().parse().ok()?;
    let lat: f64 = parts[1].trim().parse().ok()?;
    let alt_ft = parts
        .get(2)
        .and_then(|a| a.trim().parse::<f64>().ok())
        .map(meters_to_feet)
        .unwrap_or(f64::NAN);
    Some((lon, lat, alt_ft))
}

/// Write a corrected flight path back to KML, altitudes in meters,
/// transition placemarks hidden with climb/descent pushpin styles.
pub fn write_corrected(path: &FlightPath, document_name: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_to_internal)?;

    let kml = quick_xml::events::BytesStart::new("kml")
        .with_attributes([("xmlns", KML_NAMESPACE)]);
    writer.write_event(Event::Start(kml)).map_err(io_to_internal)?;
    start(&mut writer, "Document")?;
    text_element(&mut writer, "name", document_name)?;

    for (id, color) in [
        ("wpt-pushpin", "ylw-pushpin"),
        ("climb-pushpin", "grn-pushpin"),
        ("descent-pushpin", "red-pushpin"),
    ] {
        let style =
            quick_xml::events::BytesStart::new("Style").with_attributes([("id", id)]);
        writer.write_event(Event::Start(style)).map_err(io_to_internal)?;
        start(&mut writer, "IconStyle")?;
        start(&mut writer, "Icon")?;
        text_element(
            &mut writer,
            "href",
            &format!("http://maps.google.com/mapfiles/kml/pushpin/{color}.png"),
        )?;
        end(&mut writer, "Icon")?;
        end(&mut writer, "IconStyle")?;
        end(&mut writer, "Style")?;
    }

    // The corrected navigation line.
    start(&mut writer, "Placemark")?;
    text_element(&mut writer, "name", "Navigation")?;
    start(&mut writer, "LineString")?;
    text_element(&mut writer, "altitudeMode", "absolute")?;
    let coordinates = path
        .waypoints()
        .iter()
        .map(|w| format!("{},{},{:.3}", w.lon, w.lat, feet_to_meters(w.altitude_ft)))
        .collect::<Vec<_>>()
        .join(" ");
    text_element(&mut writer, "coordinates", &coordinates)?;
    end(&mut writer, "LineString")?;
    end(&mut writer, "Placemark")?;

    start(&mut writer, "Folder")?;
    text_element(&mut writer, "name", "Points")?;
    for waypoint in path.waypoints() {
        let transition = is_transition_waypoint(&waypoint.id);
        start(&mut writer, "Placemark")?;
        text_element(&mut writer, "name", &waypoint.id)?;
        text_element(&mut writer, "visibility", if transition { "0" } else { "1" })?;
        let style = if waypoint.id.starts_with("Climb_") {
            "#climb-pushpin"
        } else if waypoint.id.starts_with("Descent_") {
            "#descent-pushpin"
        } else {
            "#wpt-pushpin"
        };
        text_element(&mut writer, "styleUrl", style)?;
        start(&mut writer, "Point")?;
        text_element(&mut writer, "altitudeMode", "absolute")?;
        text_element(
            &mut writer,
            "coordinates",
            &format!(
                "{},{},{:.3}",
                waypoint.lon,
                waypoint.lat,
                feet_to_meters(waypoint.altitude_ft)
            ),
        )?;
        end(&mut writer, "Point")?;
        end(&mut writer, "Placemark")?;
    }
    end(&mut writer, "Folder")?;

    end(&mut writer, "Document")?;
    end(&mut writer, "kml")?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Internal(format!("kml output is not UTF-8: {e}")))
}

fn start(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    writer
        .write_event(Event::Start(quick_xml::events::BytesStart::new(name)))
        .map_err(io_to_internal)
}

fn end(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(name)))
        .map_err(io_to_internal)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<()> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(io_to_internal)?;
    end(writer, name)
}

fn io_to_internal(err: std::io::Error) -> Error {
    Error::Internal(format!("kml writer: {err}"))
}
