//! GPX output.
//!
//! Converts a merged GeoJSON track into GPX 1.1 text. A closed set of
//! dialects attaches the track's voice hints in the extension schema a
//! particular consumer app understands; [`Dialect::Plain`] emits none.
//! Point features of the collection (route waypoints, POI markers)
//! become `<wpt>` elements.
//!
//! Rendering is a pure transformation to a `String`; the result is piped
//! through [`pretty`] so downloads and test comparisons share one
//! canonical layout.

use std::collections::HashMap;
use std::fmt::Write;

use crate::error::{ExportError, Result};
use crate::geo_utils::along_track_distance;
use crate::hints::{extract_hints, VoiceHint};
use crate::{Coordinates, Feature, FeatureCollection, Position};

/// Identifies this library in the GPX `creator` attribute.
const CREATOR: &str = concat!("route-export ", env!("CARGO_PKG_VERSION"));

const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const LOCUS_NS: &str = "http://www.locusmap.eu";
const ORUX_NS: &str = "http://www.oruxmaps.com/oruxmapsextensions/1/0";

/// Locus route compute type announced for cycle routes.
const LOCUS_COMPUTE_TYPE: u8 = 9;

/// GPX voice-hint dialect, selected by the backend turn-instruction mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Plain GPX 1.1 without voice-hint extensions.
    #[default]
    Plain,
    /// Locus Map point actions (mode 2).
    Locus,
    /// OsmAnd route block (mode 3).
    Osmand,
    /// Hints encoded in an XML comment (mode 4).
    Comment,
    /// GPSies-style turn waypoints (mode 5).
    Gpsies,
    /// OruxMaps icon extensions (mode 6).
    Orux,
}

impl Dialect {
    /// Map a backend turn-instruction mode onto a dialect.
    ///
    /// Modes without a GPX schema are rejected rather than silently
    /// degraded to [`Dialect::Plain`], so callers cannot ship a file
    /// with the wrong extensions.
    pub fn from_mode(mode: u8) -> Result<Self> {
        match mode {
            0 => Ok(Dialect::Plain),
            2 => Ok(Dialect::Locus),
            3 => Ok(Dialect::Osmand),
            4 => Ok(Dialect::Comment),
            5 => Ok(Dialect::Gpsies),
            6 => Ok(Dialect::Orux),
            other => Err(ExportError::UnsupportedDialect(other)),
        }
    }
}

// ============================================================================
// Numeric formatting policy
// ============================================================================

/// Numeric field kinds the dialects format differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Distance,
    Time,
    Speed,
    Angle,
    Offset,
}

/// Central formatting-policy table: fixed decimal places or shortest
/// round-trip form, with optional left padding, per dialect and field.
fn format_field(dialect: Dialect, kind: FieldKind, value: f64) -> String {
    let (decimals, pad): (Option<usize>, usize) = match (dialect, kind) {
        (Dialect::Locus, FieldKind::Time | FieldKind::Speed) => (Some(3), 0),
        (Dialect::Comment, _) => (None, 10),
        _ => (Some(0), 0),
    };
    let text = match decimals {
        Some(0) => format!("{}", value.round() as i64),
        Some(n) => format!("{value:.n$}"),
        None => shortest(value),
    };
    if pad > 0 {
        format!("{text:>pad$}")
    } else {
        text
    }
}

/// Shortest round-trip representation, integers without a decimal point.
fn shortest(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Formatting
// ============================================================================

/// Render a track as GPX 1.1 text in the given dialect.
///
/// The track must contain a LineString feature with at least two
/// vertices (an origin and a destination). Any dialect other than
/// [`Dialect::Plain`] requires the track to carry `voicehints`.
pub fn format(track: &FeatureCollection, dialect: Dialect) -> Result<String> {
    let feature = track
        .track_feature()
        .ok_or_else(|| ExportError::InvalidTrack("no LineString feature".to_string()))?;
    let coords = feature
        .geometry
        .line()
        .ok_or_else(|| ExportError::InvalidTrack("no LineString feature".to_string()))?;
    if coords.len() < 2 {
        return Err(ExportError::InvalidTrack(
            "fewer than 2 track points".to_string(),
        ));
    }

    let hints = match dialect {
        Dialect::Plain => Vec::new(),
        _ => extract_hints(track)?,
    };

    let total_distance = feature
        .properties
        .track_length
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or_else(|| along_track_distance(coords, 0, coords.len() - 1));
    let total_seconds = feature
        .properties
        .times
        .last()
        .copied()
        .or_else(|| {
            feature
                .properties
                .total_time
                .as_deref()
                .and_then(|v| v.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    // seconds from each hint to the next one (or to the track end)
    let leg_seconds: Vec<f64> = hints
        .iter()
        .enumerate()
        .map(|(i, hint)| {
            let next = hints.get(i + 1).map_or(total_seconds, |n| n.time);
            (next - hint.time).max(0.0)
        })
        .collect();
    let hint_by_vertex: HashMap<usize, usize> =
        hints.iter().enumerate().map(|(i, h)| (h.index, i)).collect();

    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = write!(out, r#"<gpx xmlns="{GPX_NS}""#);
    match dialect {
        Dialect::Locus => {
            let _ = write!(out, r#" xmlns:locus="{LOCUS_NS}""#);
        }
        Dialect::Orux => {
            let _ = write!(out, r#" xmlns:om="{ORUX_NS}""#);
        }
        _ => {}
    }
    let _ = write!(out, r#" version="1.1" creator="{}">"#, escape(CREATOR));

    if dialect == Dialect::Comment {
        write_comment_hints(&mut out, &hints);
    }

    for point in &track.features {
        if point.geometry.kind == "Point" {
            write_wpt(&mut out, point);
        }
    }
    if dialect == Dialect::Gpsies {
        for hint in &hints {
            write_gpsies_wpt(&mut out, hint);
        }
    }

    out.push_str("<trk>");
    let name = feature.properties.name.as_deref().unwrap_or("Track");
    let _ = write!(out, "<name>{}</name>", escape(name));
    if dialect == Dialect::Locus {
        write_locus_track_extensions(&mut out, total_distance, total_seconds);
    }

    out.push_str("<trkseg>");
    for (vertex, pos) in coords.iter().enumerate() {
        write_trkpt(&mut out, vertex, pos, dialect, &hints, &leg_seconds, &hint_by_vertex)?;
    }
    out.push_str("</trkseg></trk>");

    if dialect == Dialect::Osmand {
        write_osmand_route(&mut out, &hints);
    }

    out.push_str("</gpx>");
    Ok(pretty(&out))
}

fn write_trkpt(
    out: &mut String,
    vertex: usize,
    pos: &Position,
    dialect: Dialect,
    hints: &[VoiceHint],
    leg_seconds: &[f64],
    hint_by_vertex: &HashMap<usize, usize>,
) -> Result<()> {
    let (lon, lat) = match (pos.first(), pos.get(1)) {
        (Some(lon), Some(lat)) => (*lon, *lat),
        _ => {
            return Err(ExportError::InvalidTrack(format!(
                "track point {vertex} has fewer than 2 ordinates"
            )))
        }
    };

    let mut children = String::new();
    if let Some(ele) = pos.get(2) {
        let _ = write!(children, "<ele>{}</ele>", shortest(*ele));
    }
    if let Some(&i) = hint_by_vertex.get(&vertex) {
        match dialect {
            Dialect::Locus => write_locus_point_extensions(&mut children, &hints[i], leg_seconds[i]),
            Dialect::Orux => write_orux_point_extensions(&mut children, &hints[i]),
            _ => {}
        }
    }

    if children.is_empty() {
        let _ = write!(out, r#"<trkpt lat="{}" lon="{}"/>"#, shortest(lat), shortest(lon));
    } else {
        let _ = write!(
            out,
            r#"<trkpt lat="{}" lon="{}">{children}</trkpt>"#,
            shortest(lat),
            shortest(lon)
        );
    }
    Ok(())
}

/// Point features (route waypoints, POI markers) become `<wpt>` elements.
fn write_wpt(out: &mut String, feature: &Feature) {
    let Coordinates::Point(pos) = &feature.geometry.coordinates else {
        return;
    };
    let (Some(lon), Some(lat)) = (pos.first(), pos.get(1)) else {
        return;
    };
    let _ = write!(out, r#"<wpt lat="{}" lon="{}">"#, shortest(*lat), shortest(*lon));
    if let Some(ele) = pos.get(2) {
        let _ = write!(out, "<ele>{}</ele>", shortest(*ele));
    }
    if let Some(name) = &feature.properties.name {
        let _ = write!(out, "<name>{}</name>", escape(name));
    }
    if let Some(kind) = &feature.properties.kind {
        let _ = write!(out, "<type>{}</type>", escape(kind));
    }
    out.push_str("</wpt>");
}

/// Mode 4: hints encoded as a fixed-width table inside an XML comment,
/// one row per hint. Comment content stays free of markup characters so
/// generic XML tooling passes it through untouched.
fn write_comment_hints(out: &mut String, hints: &[VoiceHint]) {
    out.push_str("<!-- voice hints: symbol;vertex;distance;time\n");
    for hint in hints {
        let _ = writeln!(
            out,
            "{:>6};{};{};{};",
            hint.command.symbol_text(hint.exit),
            format_field(Dialect::Comment, FieldKind::Offset, hint.index as f64),
            format_field(Dialect::Comment, FieldKind::Distance, hint.distance),
            format_field(Dialect::Comment, FieldKind::Time, hint.time),
        );
    }
    out.push_str("-->");
}

/// Mode 5: one waypoint per hint carrying the instruction and symbol.
fn write_gpsies_wpt(out: &mut String, hint: &VoiceHint) {
    let _ = write!(
        out,
        r#"<wpt lat="{}" lon="{}">"#,
        shortest(hint.lat),
        shortest(hint.lon)
    );
    let _ = write!(
        out,
        "<name>{}</name>",
        escape(&hint.command.instruction(hint.exit))
    );
    let _ = write!(out, "<sym>{}</sym>", hint.command.gpsies);
    let _ = write!(out, "<type>{}</type>", hint.command.gpsies);
    out.push_str("</wpt>");
}

/// Mode 2: route totals at track level.
fn write_locus_track_extensions(out: &mut String, total_distance: f64, total_seconds: f64) {
    let speed = if total_seconds > 0.0 {
        total_distance / total_seconds
    } else {
        0.0
    };
    out.push_str("<extensions>");
    let _ = write!(
        out,
        "<locus:rteComputeType>{LOCUS_COMPUTE_TYPE}</locus:rteComputeType>"
    );
    let _ = write!(
        out,
        "<locus:rteDistance>{}</locus:rteDistance>",
        format_field(Dialect::Locus, FieldKind::Distance, total_distance)
    );
    let _ = write!(
        out,
        "<locus:rteTime>{}</locus:rteTime>",
        format_field(Dialect::Locus, FieldKind::Time, total_seconds)
    );
    let _ = write!(
        out,
        "<locus:rteSpeed>{}</locus:rteSpeed>",
        format_field(Dialect::Locus, FieldKind::Speed, speed)
    );
    out.push_str("<locus:rteSimpleRoundabouts>1</locus:rteSimpleRoundabouts>");
    out.push_str("</extensions>");
}

/// Mode 2: per-hint point action plus the leg to the next hint.
fn write_locus_point_extensions(out: &mut String, hint: &VoiceHint, leg_seconds: f64) {
    let speed = if leg_seconds > 0.0 {
        hint.distance / leg_seconds
    } else {
        0.0
    };
    out.push_str("<extensions>");
    let _ = write!(
        out,
        "<locus:rtePointAction>{}</locus:rtePointAction>",
        hint.command.locus_action(hint.exit)
    );
    let _ = write!(
        out,
        "<locus:rteDistance>{}</locus:rteDistance>",
        format_field(Dialect::Locus, FieldKind::Distance, hint.distance)
    );
    let _ = write!(
        out,
        "<locus:rteTime>{}</locus:rteTime>",
        format_field(Dialect::Locus, FieldKind::Time, leg_seconds)
    );
    let _ = write!(
        out,
        "<locus:rteSpeed>{}</locus:rteSpeed>",
        format_field(Dialect::Locus, FieldKind::Speed, speed)
    );
    out.push_str("</extensions>");
}

/// Mode 6: per-hint icon extension.
fn write_orux_point_extensions(out: &mut String, hint: &VoiceHint) {
    out.push_str("<extensions><om:oruxmapsextensions>");
    let _ = write!(
        out,
        r#"<om:ext type="ICON" subtype="0">{}</om:ext>"#,
        hint.command.orux
    );
    out.push_str("</om:oruxmapsextensions></extensions>");
}

/// Mode 3: a route block after the track, one route point per hint.
fn write_osmand_route(out: &mut String, hints: &[VoiceHint]) {
    out.push_str("<rte>");
    for hint in hints {
        let _ = write!(
            out,
            r#"<rtept lat="{}" lon="{}">"#,
            shortest(hint.lat),
            shortest(hint.lon)
        );
        let _ = write!(
            out,
            "<desc>{}</desc>",
            escape(&hint.command.instruction(hint.exit))
        );
        out.push_str("<extensions>");
        let _ = write!(
            out,
            "<time>{}</time>",
            format_field(Dialect::Osmand, FieldKind::Time, hint.time)
        );
        let _ = write!(out, "<turn>{}</turn>", hint.command.symbol_text(hint.exit));
        let _ = write!(
            out,
            "<turn-angle>{}</turn-angle>",
            format_field(Dialect::Osmand, FieldKind::Angle, hint.command.angle as f64)
        );
        let _ = write!(out, "<offset>{}</offset>", hint.index);
        out.push_str("</extensions></rtept>");
    }
    out.push_str("</rte>");
}

// ============================================================================
// Pretty-printing
// ============================================================================

/// Reformat GPX text into canonical layout: one tag per line, one space
/// of indentation per depth, text content kept on its element's line,
/// comments preserved verbatim.
///
/// A pure text transform, idempotent, and a no-op on already-canonical
/// input.
pub fn pretty(gpx: &str) -> String {
    let mut out = String::with_capacity(gpx.len() + gpx.len() / 8);
    let mut depth: usize = 0;
    for node in split_nodes(gpx) {
        let body = node.trim_start_matches('<');
        let closing = body.starts_with('/');
        if closing {
            depth = depth.saturating_sub(1);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        for _ in 0..depth {
            out.push(' ');
        }
        out.push_str(node);
        let self_contained = closing
            || body.starts_with('?')
            || body.starts_with('!')
            || node.ends_with("/>")
            || node.contains("</");
        if !self_contained {
            depth += 1;
        }
    }
    out
}

/// Split markup into nodes, each spanning from a `<` to the `>` that is
/// followed (ignoring whitespace) by the next `<` or the end of input.
/// Inter-node whitespace is dropped; element text stays inside its node.
fn split_nodes(gpx: &str) -> Vec<&str> {
    let mut nodes = Vec::new();
    let mut pos = match gpx.find('<') {
        Some(p) => p,
        None => return nodes,
    };
    while pos < gpx.len() {
        let mut end = None;
        let mut search = pos;
        while let Some(found) = gpx[search..].find('>') {
            let gt = search + found;
            let rest = gpx[gt + 1..].trim_start();
            if rest.is_empty() || rest.starts_with('<') {
                end = Some(gt);
                break;
            }
            search = gt + 1;
        }
        let Some(end) = end else {
            nodes.push(&gpx[pos..]);
            break;
        };
        nodes.push(&gpx[pos..=end]);
        match gpx[end + 1..].find('<') {
            Some(next) => pos = end + 1 + next,
            None => break,
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Feature;
    use serde_json::json;

    /// 3-vertex meridian track with a hint at the middle vertex.
    fn sample_track(voicehints: Option<serde_json::Value>) -> FeatureCollection {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[0.0, 0.0, 100.0], [0.0, 0.001, 101.5], [0.0, 0.002, 103.0]],
            },
            "properties": {
                "name": "Track",
                "track-length": "222",
                "total-time": "40",
                "times": [0.0, 20.0, 40.0],
                "voicehints": voicehints,
            }
        }))
        .unwrap();
        FeatureCollection::new(vec![feature])
    }

    fn hinted_track() -> FeatureCollection {
        sample_track(Some(json!([[1, 2, 0, 111]])))
    }

    #[test]
    fn test_plain_format_has_no_extensions() {
        let gpx = format(&sample_track(None), Dialect::Plain).unwrap();
        assert!(gpx.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(gpx.contains("version=\"1.1\""));
        assert!(gpx.contains("creator=\"route-export"));
        assert!(gpx.contains("<name>Track</name>"));
        assert!(gpx.contains("<trkpt lat=\"0.001\" lon=\"0\">"));
        assert!(gpx.contains("<ele>101.5</ele>"));
        assert!(!gpx.contains("<extensions>"));
        assert!(!gpx.contains("<wpt"));
    }

    #[test]
    fn test_format_output_is_canonical() {
        let gpx = format(&hinted_track(), Dialect::Locus).unwrap();
        assert_eq!(pretty(&gpx), gpx);
    }

    #[test]
    fn test_locus_dialect() {
        let gpx = format(&hinted_track(), Dialect::Locus).unwrap();
        assert!(gpx.contains("xmlns:locus=\"http://www.locusmap.eu\""));
        // track totals: integer distance, 3-decimal time/speed
        assert!(gpx.contains("<locus:rteDistance>222</locus:rteDistance>"));
        assert!(gpx.contains("<locus:rteTime>40.000</locus:rteTime>"));
        assert!(gpx.contains("<locus:rteSpeed>5.550</locus:rteSpeed>"));
        // hint at vertex 1: turn left, 111 m and 20 s to the track end
        assert!(gpx.contains("<locus:rtePointAction>4</locus:rtePointAction>"));
        assert!(gpx.contains("<locus:rteTime>20.000</locus:rteTime>"));
        assert!(gpx.contains("<locus:rteSpeed>5.550</locus:rteSpeed>"));
    }

    #[test]
    fn test_osmand_dialect() {
        let gpx = format(&hinted_track(), Dialect::Osmand).unwrap();
        assert!(gpx.contains("<rte>"));
        assert!(gpx.contains("<desc>turn left</desc>"));
        assert!(gpx.contains("<time>20</time>"));
        assert!(gpx.contains("<turn>TL</turn>"));
        assert!(gpx.contains("<turn-angle>-90</turn-angle>"));
        assert!(gpx.contains("<offset>1</offset>"));
    }

    #[test]
    fn test_comment_dialect() {
        let gpx = format(&hinted_track(), Dialect::Comment).unwrap();
        assert!(gpx.contains("<!-- voice hints:"));
        assert!(gpx.contains("    TL;         1;       111;        20;"));
        // the comment survives re-formatting untouched
        assert_eq!(pretty(&gpx), gpx);
    }

    #[test]
    fn test_gpsies_dialect() {
        let gpx = format(&hinted_track(), Dialect::Gpsies).unwrap();
        assert!(gpx.contains("<wpt lat=\"0.001\" lon=\"0\">"));
        assert!(gpx.contains("<name>turn left</name>"));
        assert!(gpx.contains("<sym>left</sym>"));
        assert!(gpx.contains("<type>left</type>"));
    }

    #[test]
    fn test_orux_dialect() {
        let gpx = format(&hinted_track(), Dialect::Orux).unwrap();
        assert!(gpx.contains("xmlns:om=\"http://www.oruxmaps.com/oruxmapsextensions/1/0\""));
        assert!(gpx.contains("<om:ext type=\"ICON\" subtype=\"0\">1001</om:ext>"));
    }

    #[test]
    fn test_roundabout_exit_rendering() {
        let track = sample_track(Some(json!([[1, 13, 2, 111]])));
        let gpx = format(&track, Dialect::Osmand).unwrap();
        assert!(gpx.contains("<desc>take exit 2</desc>"));
        assert!(gpx.contains("<turn>RNDB2</turn>"));

        let gpx = format(&track, Dialect::Locus).unwrap();
        assert!(gpx.contains("<locus:rtePointAction>28</locus:rtePointAction>"));
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(Dialect::from_mode(0).unwrap(), Dialect::Plain);
        assert_eq!(Dialect::from_mode(2).unwrap(), Dialect::Locus);
        assert_eq!(Dialect::from_mode(6).unwrap(), Dialect::Orux);
        assert_eq!(
            Dialect::from_mode(1),
            Err(ExportError::UnsupportedDialect(1))
        );
        assert_eq!(
            Dialect::from_mode(7),
            Err(ExportError::UnsupportedDialect(7))
        );
    }

    #[test]
    fn test_hint_dialect_requires_hints() {
        assert_eq!(
            format(&sample_track(None), Dialect::Locus),
            Err(ExportError::MissingVoiceHints)
        );
    }

    #[test]
    fn test_too_short_track_is_rejected() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0]] },
            "properties": {}
        }))
        .unwrap();
        let track = FeatureCollection::new(vec![feature]);
        assert!(matches!(
            format(&track, Dialect::Plain),
            Err(ExportError::InvalidTrack(_))
        ));

        let empty = FeatureCollection::new(vec![]);
        assert!(matches!(
            format(&empty, Dialect::Plain),
            Err(ExportError::InvalidTrack(_))
        ));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut track = sample_track(None);
        track.features[0].properties.name = Some("Tom & Jerry <3".to_string());
        let gpx = format(&track, Dialect::Plain).unwrap();
        assert!(gpx.contains("<name>Tom &amp; Jerry &lt;3</name>"));
    }

    #[test]
    fn test_pretty_is_idempotent() {
        let compact = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><gpx version=\"1.1\"><trk>\
                       <name>Track</name><trkseg><trkpt lat=\"0\" lon=\"0\"/>\
                       <trkpt lat=\"1\" lon=\"1\"><ele>5</ele></trkpt></trkseg></trk></gpx>";
        let once = pretty(compact);
        assert_eq!(pretty(&once), once);

        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                        <gpx version=\"1.1\">\n\
                        \u{20}<trk>\n\
                        \u{20} <name>Track</name>\n\
                        \u{20} <trkseg>\n\
                        \u{20}  <trkpt lat=\"0\" lon=\"0\"/>\n\
                        \u{20}  <trkpt lat=\"1\" lon=\"1\">\n\
                        \u{20}   <ele>5</ele>\n\
                        \u{20}  </trkpt>\n\
                        \u{20} </trkseg>\n\
                        \u{20}</trk>\n\
                        </gpx>";
        assert_eq!(once, expected);
    }
}
