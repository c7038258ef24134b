//! Streaming two-pass AIXM 4.5 extraction.
//!
//! Pass 1 scans `Ase` elements into airspace headers; pass 2 scans `Abd`
//! border elements, parses and rasterizes their `Avx` vertices and attaches
//! them to the headers by `codeId`. Only the current element's fields are
//! held while scanning, so memory stays flat regardless of document size.
//!
//! Per-record failures (missing code, malformed coordinates, inverted
//! altitude bands) drop that single record and are tallied in the
//! [`ExtractionSummary`]; extraction as a whole fails only when the XML is
//! unreadable or more than 5% of records were dropped.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Seek, SeekFrom};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use skycheck_core::models::{Airspace, AirspaceType, Vertex};
use skycheck_core::units::AltitudeLimit;

use crate::aixm::coords::{parse_dms, radius_km, rasterize_arc};
use crate::error::{Error, Result};
use crate::persistence::{airspaces, AirspaceRecord, BorderRecord};

/// Minimum share of `Ase` records that must survive extraction.
const MIN_KEPT_RATIO: f64 = 0.95;
/// Cap on retained skip reasons; the counts keep going.
const MAX_SKIP_DETAILS: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub ase_elements: usize,
    pub abd_elements: usize,
    pub airspaces_kept: usize,
    pub airspaces_skipped: usize,
    pub borders: usize,
    pub vertices: usize,
    /// Human-readable reasons for the first skipped records.
    pub skipped: Vec<String>,
}

impl ExtractionSummary {
    fn skip(&mut self, reason: String) {
        self.airspaces_skipped += 1;
        if self.skipped.len() < MAX_SKIP_DETAILS {
            self.skipped.push(reason);
        }
    }
}

/// Extract an AIXM file into the store. Fatal on a missing file or
/// malformed XML; per-record deviations are isolated and summarized.
pub async fn extract_file(pool: &SqlitePool, path: &Path) -> Result<ExtractionSummary> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    extract_reader(pool, &mut reader).await
}

/// Extract from any rewindable reader (two streaming passes).
pub async fn extract_reader<R: BufRead + Seek>(
    pool: &SqlitePool,
    reader: &mut R,
) -> Result<ExtractionSummary> {
    let (records, summary) = parse_document(reader)?;

    if summary.ase_elements > 0 {
        let ratio = summary.airspaces_kept as f64 / summary.ase_elements as f64;
        if ratio < MIN_KEPT_RATIO {
            return Err(Error::DatasetIncomplete {
                kept: summary.airspaces_kept,
                total: summary.ase_elements,
            });
        }
    }

    airspaces::bulk_insert(pool, &records).await?;

    info!(
        ase = summary.ase_elements,
        abd = summary.abd_elements,
        kept = summary.airspaces_kept,
        skipped = summary.airspaces_skipped,
        borders = summary.borders,
        vertices = summary.vertices,
        "AIXM extraction complete"
    );
    Ok(summary)
}

/// Parse the document into records without touching the store.
pub fn parse_document<R: BufRead + Seek>(
    reader: &mut R,
) -> Result<(Vec<AirspaceRecord>, ExtractionSummary)> {
    let mut summary = ExtractionSummary::default();

    reader.seek(SeekFrom::Start(0))?;
    let (mut records, index) = pass1_airspaces(reader, &mut summary)?;

    reader.seek(SeekFrom::Start(0))?;
    let poisoned = pass2_borders(reader, &mut records, &index, &mut summary)?;

    // A record with a malformed coordinate is dropped whole.
    if !poisoned.is_empty() {
        let mut kept = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            if poisoned.contains(&i) {
                summary.skip(format!(
                    "{}: malformed boundary coordinate",
                    record.airspace.code_id
                ));
            } else {
                kept.push(record);
            }
        }
        records = kept;
    }

    summary.airspaces_kept = records.len();
    summary.borders = records.iter().map(|r| r.borders.len()).sum();
    summary.vertices = records
        .iter()
        .flat_map(|r| r.borders.iter())
        .map(|b| b.vertices.len())
        .sum();

    Ok((records, summary))
}

// ===========================================================================
// Pass 1: Ase headers
// ===========================================================================

#[derive(Default)]
struct AseFields {
    code_id: Option<String>,
    code_type: Option<String>,
    name: Option<String>,
    class: Option<String>,
    code_upper: Option<String>,
    val_upper: Option<String>,
    uom_upper: Option<String>,
    code_lower: Option<String>,
    val_lower: Option<String>,
    uom_lower: Option<String>,
    work_hours: Option<String>,
    remarks: Option<String>,
}

fn pass1_airspaces<R: BufRead>(
    reader: &mut R,
    summary: &mut ExtractionSummary,
) -> Result<(Vec<AirspaceRecord>, HashMap<String, usize>)> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut records: Vec<AirspaceRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<AseFields> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "Ase" {
                    summary.ase_elements += 1;
                    current = Some(AseFields::default());
                }
                stack.push(name);
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("Ase") {
                    if let Some(fields) = current.take() {
                        finish_ase(fields, &mut records, &mut index, summary);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(fields) = current.as_mut() {
                    let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                    capture_ase_field(fields, &stack, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((records, index))
}

fn capture_ase_field(fields: &mut AseFields, stack: &[String], text: String) {
    let leaf = stack.last().map(String::as_str).unwrap_or("");
    let parent = stack
        .len()
        .checked_sub(2)
        .map(|i| stack[i].as_str())
        .unwrap_or("");

    match (parent, leaf) {
        ("AseUid", "codeId") => fields.code_id = Some(text),
        ("AseUid", "codeType") => fields.code_type = Some(text),
        ("Ase", "txtName") => fields.name = Some(text),
        ("Ase", "codeClass") => fields.class = Some(text),
        ("Ase", "codeDistVerUpper") => fields.code_upper = Some(text),
        ("Ase", "valDistVerUpper") => fields.val_upper = Some(text),
        ("Ase", "uomDistVerUpper") => fields.uom_upper = Some(text),
        ("Ase", "codeDistVerLower") => fields.code_lower = Some(text),
        ("Ase", "valDistVerLower") => fields.val_lower = Some(text),
        ("Ase", "uomDistVerLower") => fields.uom_lower = Some(text),
        ("Att", "codeWorkHr") => fields.work_hours = Some(text),
        ("Att", "txtRmkWorkHr") | ("Ase", "txtRmk") => fields.remarks = Some(text),
        _ => {}
    }
}

fn finish_ase(
    fields: AseFields,
    records: &mut Vec<AirspaceRecord>,
    index: &mut HashMap<String, usize>,
    summary: &mut ExtractionSummary,
) {
    let Some(code_id) = fields.code_id.filter(|c| !c.is_empty()) else {
        summary.skip("Ase without AseUid/codeId".to_string());
        return;
    };

    let min_altitude = match parse_limit(
        fields.code_lower.as_deref(),
        fields.val_lower.as_deref(),
        fields.uom_lower.as_deref(),
    ) {
        Ok(limit) => limit,
        Err(reason) => {
            summary.skip(format!("{code_id}: lower limit: {reason}"));
            return;
        }
    };
    let max_altitude = match parse_limit(
        fields.code_upper.as_deref(),
        fields.val_upper.as_deref(),
        fields.uom_upper.as_deref(),
    ) {
        Ok(limit) => limit,
        Err(reason) => {
            summary.skip(format!("{code_id}: upper limit: {reason}"));
            return;
        }
    };

    if let (Some(lo), Some(hi)) = (min_altitude, max_altitude) {
        if lo.to_feet() > hi.to_feet() {
            summary.skip(format!(
                "{code_id}: inverted altitude band ({} > {})",
                lo.to_feet(),
                hi.to_feet()
            ));
            return;
        }
    }

    let code_type = fields
        .code_type
        .as_deref()
        .map(AirspaceType::from_code)
        .unwrap_or(AirspaceType::DOther);

    let airspace = Airspace {
        id: 0,
        name: fields.name.unwrap_or_else(|| code_id.clone()),
        code_id: code_id.clone(),
        code_type,
        airspace_class: fields
            .class
            .as_deref()
            .and_then(|c| c.trim().chars().next())
            .map(|c| c.to_ascii_uppercase()),
        min_altitude,
        max_altitude,
        operating_hours: fields.work_hours,
        remarks: fields.remarks,
    };

    let record = AirspaceRecord {
        airspace,
        borders: Vec::new(),
    };

    // Later records replace earlier ones with the same code.
    if let Some(&slot) = index.get(&code_id) {
        records[slot] = record;
    } else {
        index.insert(code_id, records.len());
        records.push(record);
    }
}

fn parse_limit(
    code: Option<&str>,
    val: Option<&str>,
    uom: Option<&str>,
) -> std::result::Result<Option<AltitudeLimit>, String> {
    let code = code.map(str::trim).filter(|s| !s.is_empty());
    let val = val.map(str::trim).filter(|s| !s.is_empty());
    let uom = uom.map(str::trim).filter(|s| !s.is_empty());

    if code.is_none() && val.is_none() && uom.is_none() {
        return Ok(None);
    }
    if code == Some("UNL") || val == Some("UNL") || uom == Some("UNL") {
        return Ok(Some(AltitudeLimit::Unlimited));
    }
    if code == Some("GND") || val == Some("GND") {
        return Ok(Some(AltitudeLimit::Ground));
    }

    let Some(val) = val else {
        return Ok(None);
    };
    let number: f64 = val
        .parse()
        .map_err(|_| format!("unparseable value {val:?}"))?;

    // STD is the standard-pressure reference, i.e. a flight level.
    if uom == Some("FL") || code == Some("STD") {
        return Ok(Some(AltitudeLimit::FlightLevel(number as u16)));
    }
    match uom {
        Some("M") => Ok(Some(AltitudeLimit::Meters(number))),
        Some("FT") | None => {
            // HEI is height above ground; a zero height is the ground itself.
            if code == Some("HEI") && number == 0.0 {
                Ok(Some(AltitudeLimit::Ground))
            } else {
                Ok(Some(AltitudeLimit::Feet(number.round() as i32)))
            }
        }
        Some(other) => Err(format!("unknown unit {other:?}")),
    }
}

// ===========================================================================
// Pass 2: Abd borders and Avx vertices
// ===========================================================================

#[derive(Default)]
struct RawVertex {
    code_type: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
    arc_lat: Option<String>,
    arc_lon: Option<String>,
    radius: Option<String>,
    radius_uom: Option<String>,
}

#[derive(Default)]
struct AbdFields {
    link_code_id: Option<String>,
    vertices: Vec<RawVertex>,
}

fn pass2_borders<R: BufRead>(
    reader: &mut R,
    records: &mut [AirspaceRecord],
    index: &HashMap<String, usize>,
    summary: &mut ExtractionSummary,
) -> Result<HashSet<usize>> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<AbdFields> = None;
    let mut poisoned: HashSet<usize> = HashSet::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "Abd" {
                    summary.abd_elements += 1;
                    current = Some(AbdFields::default());
                } else if name == "Avx" {
                    if let Some(abd) = current.as_mut() {
                        abd.vertices.push(RawVertex::default());
                    }
                }
                stack.push(name);
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("Abd") {
                    if let Some(abd) = current.take() {
                        finish_abd(abd, records, index, &mut poisoned);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(abd) = current.as_mut() {
                    let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                    capture_abd_field(abd, &stack, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(poisoned)
}

fn capture_abd_field(abd: &mut AbdFields, stack: &[String], text: String) {
    let leaf = stack.last().map(String::as_str).unwrap_or("");
    let parent = stack
        .len()
        .checked_sub(2)
        .map(|i| stack[i].as_str())
        .unwrap_or("");
    let grandparent = stack
        .len()
        .checked_sub(3)
        .map(|i| stack[i].as_str())
        .unwrap_or("");

    if leaf == "codeId" && parent == "AseUid" && grandparent == "AbdUid" {
        abd.link_code_id = Some(text);
        return;
    }

    if parent != "Avx" {
        return;
    }
    let Some(vertex) = abd.vertices.last_mut() else {
        return;
    };
    match leaf {
        "codeType" => vertex.code_type = Some(text),
        "geoLat" => vertex.lat = Some(text),
        "geoLong" => vertex.lon = Some(text),
        "geoLatArc" => vertex.arc_lat = Some(text),
        "geoLongArc" => vertex.arc_lon = Some(text),
        "valRadiusArc" => vertex.radius = Some(text),
        "uomRadiusArc" => vertex.radius_uom = Some(text),
        _ => {}
    }
}

fn finish_abd(
    abd: AbdFields,
    records: &mut [AirspaceRecord],
    index: &HashMap<String, usize>,
    poisoned: &mut HashSet<usize>,
) {
    let Some(code_id) = abd.link_code_id else {
        return;
    };
    // A border for an airspace pass 1 dropped (or never saw) is ignored.
    let Some(&slot) = index.get(&code_id) else {
        return;
    };
    if poisoned.contains(&slot) {
        return;
    }

    match assemble_border(&abd.vertices) {
        Ok(points) => {
            if points.is_empty() {
                return;
            }
            let record = &mut records[slot];
            let ordinal = record.borders.len() as i64;
            record.borders.push(BorderRecord {
                ordinal,
                vertices: points
                    .into_iter()
                    .enumerate()
                    .map(|(i, (lat, lon))| Vertex {
                        ordinal: i as i64,
                        lat,
                        lon,
                    })
                    .collect(),
            });
        }
        Err(reason) => {
            warn!("Dropping airspace {}: {}", code_id, reason);
            poisoned.insert(slot);
        }
    }
}

/// Turn raw `Avx` vertices into a `(lat, lon)` sequence, rasterizing arcs.
fn assemble_border(raw: &[RawVertex]) -> std::result::Result<Vec<(f64, f64)>, String> {
    // Parse every anchor point first; any malformed coordinate poisons the
    // whole record.
    let mut anchors = Vec::with_capacity(raw.len());
    for vertex in raw {
        let lat = vertex
            .lat
            .as_deref()
            .and_then(parse_dms)
            .ok_or_else(|| format!("bad geoLat {:?}", vertex.lat))?;
        let lon = vertex
            .lon
            .as_deref()
            .and_then(parse_dms)
            .ok_or_else(|| format!("bad geoLong {:?}", vertex.lon))?;
        if !(Vertex {
            ordinal: 0,
            lat,
            lon,
        })
        .is_valid()
        {
            return Err(format!("coordinate out of range ({lat}, {lon})"));
        }
        anchors.push((lat, lon));
    }

    let mut points: Vec<(f64, f64)> = Vec::new();
    for (i, vertex) in raw.iter().enumerate() {
        let start = anchors[i];
        let code = vertex.code_type.as_deref().unwrap_or("GRC");

        match code {
            "CWA" | "CCA" => {
                let center_lat = vertex.arc_lat.as_deref().and_then(parse_dms);
                let center_lon = vertex.arc_lon.as_deref().and_then(parse_dms);
                let (Some(center_lat), Some(center_lon)) = (center_lat, center_lon) else {
                    if vertex.arc_lat.is_some() || vertex.arc_lon.is_some() {
                        return Err(format!(
                            "bad arc center {:?}/{:?}",
                            vertex.arc_lat, vertex.arc_lon
                        ));
                    }
                    // no center at all: degrade to a straight segment
                    points.push(start);
                    continue;
                };
                let radius = vertex
                    .radius
                    .as_deref()
                    .and_then(|r| r.trim().parse::<f64>().ok())
                    .map(|r| radius_km(r, vertex.radius_uom.as_deref()))
                    .unwrap_or(0.0);
                // The ring closes onto the first anchor, so the last arc
                // sweeps back to it; a lone arc vertex is a full circle.
                let end = if raw.len() > 1 {
                    Some(anchors[(i + 1) % raw.len()])
                } else {
                    None
                };
                points.extend(rasterize_arc(
                    start,
                    end,
                    (center_lat, center_lon),
                    radius,
                    code == "CWA",
                ));
            }
            // GRC is a great-circle segment; FNT (border following) is
            // rasterized the same way.
            _ => points.push(start),
        }
    }
    Ok(points)
}

fn local_name(e: &quick_xml::events::BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SNIPPET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AIXM-Snapshot>
  <Ase>
    <AseUid mid="1"><codeType>TMA</codeType><codeId>LFTMA1</codeId></AseUid>
    <txtName>PARIS TMA 1</txtName>
    <codeClass>A</codeClass>
    <codeDistVerLower>ALT</codeDistVerLower>
    <valDistVerLower>1500</valDistVerLower>
    <uomDistVerLower>FT</uomDistVerLower>
    <codeDistVerUpper>STD</codeDistVerUpper>
    <valDistVerUpper>65</valDistVerUpper>
    <uomDistVerUpper>FL</uomDistVerUpper>
    <Att><codeWorkHr>H24</codeWorkHr></Att>
  </Ase>
  <Ase>
    <AseUid mid="2"><codeType>R</codeType><codeId>LFR35A</codeId></AseUid>
    <txtName>R 35 A</txtName>
    <codeDistVerLower>HEI</codeDistVerLower>
    <valDistVerLower>0</valDistVerLower>
    <uomDistVerLower>FT</uomDistVerLower>
    <codeDistVerUpper>ALT</codeDistVerUpper>
    <valDistVerUpper>2000</valDistVerUpper>
    <uomDistVerUpper>FT</uomDistVerUpper>
  </Ase>
  <Abd>
    <AbdUid mid="10"><AseUid><codeType>TMA</codeType><codeId>LFTMA1</codeId></AseUid></AbdUid>
    <Avx><codeType>GRC</codeType><geoLat>480000N</geoLat><geoLong>0020000E</geoLong></Avx>
    <Avx><codeType>GRC</codeType><geoLat>490000N</geoLat><geoLong>0020000E</geoLong></Avx>
    <Avx><codeType>GRC</codeType><geoLat>490000N</geoLat><geoLong>0030000E</geoLong></Avx>
    <Avx><codeType>GRC</codeType><geoLat>480000N</geoLat><geoLong>0030000E</geoLong></Avx>
  </Abd>
</AIXM-Snapshot>"#;

    #[test]
    fn snippet_parses_headers_and_borders() {
        let mut cursor = Cursor::new(SNIPPET.as_bytes().to_vec());
        let (records, summary) = parse_document(&mut cursor).unwrap();

        assert_eq!(summary.ase_elements, 2);
        assert_eq!(summary.airspaces_kept, 2);
        assert_eq!(summary.airspaces_skipped, 0);

        let tma = &records[0];
        assert_eq!(tma.airspace.code_id, "LFTMA1");
        assert_eq!(tma.airspace.code_type, AirspaceType::Tma);
        assert_eq!(tma.airspace.airspace_class, Some('A'));
        assert_eq!(
            tma.airspace.min_altitude,
            Some(AltitudeLimit::Feet(1500))
        );
        assert_eq!(
            tma.airspace.max_altitude,
            Some(AltitudeLimit::FlightLevel(65))
        );
        assert_eq!(tma.airspace.operating_hours.as_deref(), Some("H24"));
        assert_eq!(tma.borders.len(), 1);
        assert_eq!(tma.borders[0].vertices.len(), 4);
        assert!((tma.borders[0].vertices[0].lat - 48.0).abs() < 1e-9);

        let r35 = &records[1];
        assert_eq!(r35.airspace.min_altitude, Some(AltitudeLimit::Ground));
        assert!(r35.borders.is_empty());
    }

    #[test]
    fn malformed_coordinate_drops_only_that_record() {
        let xml = SNIPPET.replace("480000N</geoLat><geoLong>0020000E", "garbage</geoLat><geoLong>0020000E");
        let mut cursor = Cursor::new(xml.into_bytes());
        let (records, summary) = parse_document(&mut cursor).unwrap();

        assert_eq!(summary.airspaces_kept, 1);
        assert_eq!(summary.airspaces_skipped, 1);
        assert_eq!(records[0].airspace.code_id, "LFR35A");
    }

    #[test]
    fn unknown_type_collapses_to_d_other() {
        let xml = SNIPPET.replace("<codeType>R</codeType><codeId>LFR35A</codeId>",
            "<codeType>WEIRD</codeType><codeId>LFR35A</codeId>");
        let mut cursor = Cursor::new(xml.into_bytes());
        let (records, _) = parse_document(&mut cursor).unwrap();
        assert_eq!(records[1].airspace.code_type, AirspaceType::DOther);
    }

    #[test]
    fn inverted_band_is_skipped() {
        let xml = SNIPPET.replace("<valDistVerUpper>2000</valDistVerUpper>",
            "<valDistVerUpper>-100</valDistVerUpper>");
        let mut cursor = Cursor::new(xml.into_bytes());
        let (records, summary) = parse_document(&mut cursor).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(summary.airspaces_skipped, 1);
    }

    #[test]
    fn unl_upper_limit_is_the_unlimited_sentinel() {
        let xml = SNIPPET
            .replace("<codeDistVerUpper>ALT</codeDistVerUpper>", "<codeDistVerUpper>UNL</codeDistVerUpper>")
            .replace("<valDistVerUpper>2000</valDistVerUpper>", "")
            .replace("<uomDistVerUpper>FT</uomDistVerUpper>", "");
        let mut cursor = Cursor::new(xml.into_bytes());
        let (records, _) = parse_document(&mut cursor).unwrap();
        assert_eq!(records[1].airspace.max_altitude, Some(AltitudeLimit::Unlimited));
    }

    #[test]
    fn circular_border_rasterizes_to_a_ring() {
        let xml = r#"<AIXM-Snapshot>
  <Ase>
    <AseUid><codeType>D</codeType><codeId>LFD16</codeId></AseUid>
    <txtName>D 16</txtName>
  </Ase>
  <Abd>
    <AbdUid><AseUid><codeId>LFD16</codeId></AseUid></AbdUid>
    <Avx>
      <codeType>CWA</codeType>
      <geoLat>481000N</geoLat><geoLong>0020000E</geoLong>
      <geoLatArc>480000N</geoLatArc><geoLongArc>0020000E</geoLongArc>
      <valRadiusArc>10</valRadiusArc><uomRadiusArc>NM</uomRadiusArc>
    </Avx>
  </Abd>
</AIXM-Snapshot>"#;
        let mut cursor = Cursor::new(xml.as_bytes().to_vec());
        let (records, _) = parse_document(&mut cursor).unwrap();

        let vertices = &records[0].borders[0].vertices;
        assert!(vertices.len() >= 64, "got {} vertices", vertices.len());
        for v in vertices {
            assert!(v.is_valid());
        }
    }
}
