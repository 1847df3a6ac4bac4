//! # Route Export
//!
//! Export/formatting core for a bicycle/hiking route planner.
//!
//! This library provides:
//! - Concatenation of per-leg routing responses (GeoJSON feature
//!   collections with navigation `messages` and `voicehints`) into a
//!   single continuous track with monotonic distance/time/energy
//! - GPX 1.1 rendering of a track, with a closed set of voice-hint
//!   extension dialects for different consumer apps
//! - A facade that enriches the merged track with route waypoints and
//!   POI markers before formatting
//!
//! All operations are synchronous, pure transformations over in-memory
//! data: inputs are never mutated, and calling an operation twice on the
//! same input yields structurally equal output both times.
//!
//! ## Quick Start
//!
//! ```rust
//! use route_export::{concat_segments, gpx, Dialect, Segment};
//!
//! let leg: Segment = serde_json::from_value(serde_json::json!({
//!     "feature": {
//!         "type": "Feature",
//!         "geometry": {
//!             "type": "LineString",
//!             "coordinates": [[8.4677, 49.4881], [8.4693, 49.4883]],
//!         },
//!         "properties": { "name": "Track", "times": [0.0, 12.5] },
//!     }
//! }))
//! .unwrap();
//!
//! let track = concat_segments(&[leg]).unwrap();
//! let text = gpx::format(&track, Dialect::Plain).unwrap();
//! assert!(text.starts_with("<?xml"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Unified error handling
pub mod error;
pub use error::{ExportError, Result};

// Segment concatenation (multi-leg routes into one track)
pub mod concat;
pub use concat::concat_segments;

// Geographic utilities (haversine, along-track distances)
pub mod geo_utils;

// Voice-hint model and turn-command table
pub mod hints;
pub use hints::{TurnCommand, VoiceHint};

// GPX rendering and pretty-printing
pub mod gpx;
pub use gpx::Dialect;

// Export facade (waypoint/POI enrichment + pipeline)
pub mod export;
pub use export::{Poi, PoiSource, RouteExporter};

// ============================================================================
// Core Types
// ============================================================================

/// A GeoJSON position: `[lon, lat]` or `[lon, lat, ele]`.
pub type Position = Vec<f64>;

/// Coordinates of a geometry: a single position for points, a list of
/// positions for line strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    /// LineString coordinates.
    Line(Vec<Position>),
    /// Point coordinates.
    Point(Position),
}

/// A GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Geometry type, `"LineString"` or `"Point"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Coordinates,
}

impl Geometry {
    /// The coordinate list, if this geometry is a LineString.
    pub fn line(&self) -> Option<&Vec<Position>> {
        match &self.coordinates {
            Coordinates::Line(coords) if self.kind == "LineString" => Some(coords),
            _ => None,
        }
    }

    pub(crate) fn line_mut(&mut self) -> Option<&mut Vec<Position>> {
        match &mut self.coordinates {
            Coordinates::Line(coords) if self.kind == "LineString" => Some(coords),
            _ => None,
        }
    }
}

/// Properties of a track or point feature.
///
/// Aggregate totals are carried as the backend's own formatted strings;
/// arithmetic over them happens in numeric form and is re-stringified
/// (see [`concat`]). Keys this library does not touch are preserved in
/// `extra` so re-serialization is lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// Display name (track name, or waypoint/POI name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Point feature role: `from`, `via`, `to` or `poi`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Total route length in metres.
    #[serde(rename = "track-length", skip_serializing_if = "Option::is_none")]
    pub track_length: Option<String>,

    /// Filtered total ascend in metres.
    #[serde(rename = "filtered ascend", skip_serializing_if = "Option::is_none")]
    pub filtered_ascend: Option<String>,

    /// Unfiltered ascend (end minus start elevation) in metres.
    #[serde(rename = "plain-ascend", skip_serializing_if = "Option::is_none")]
    pub plain_ascend: Option<String>,

    /// Total travel time in seconds.
    #[serde(rename = "total-time", skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,

    /// Total energy in watt-seconds.
    #[serde(rename = "total-energy", skip_serializing_if = "Option::is_none")]
    pub total_energy: Option<String>,

    /// Routing cost of the track.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,

    /// Navigation message table. Row 0 is the backend's column-header
    /// row; data rows have fixed columns (see [`concat`] for the ones
    /// this library interprets).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Vec<String>>,

    /// Cumulative travel time per geometry vertex, in seconds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub times: Vec<f64>,

    /// Voice-hint rows, `[vertex index, command, exit, distance, ...]`
    /// (see [`hints`]). Absent on segments requested without turn
    /// instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voicehints: Option<Vec<Vec<f64>>>,

    /// All property keys this library does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Properties,
}

impl Feature {
    /// Ad-hoc Point feature carrying `name` and `type` properties, as
    /// appended for route waypoints and POI markers.
    pub fn point(lon: f64, lat: f64, name: &str, kind: &str) -> Self {
        Feature {
            kind: "Feature".to_string(),
            geometry: Geometry {
                kind: "Point".to_string(),
                coordinates: Coordinates::Point(vec![lon, lat]),
            },
            properties: Properties {
                name: Some(name.to_string()),
                kind: Some(kind.to_string()),
                ..Properties::default()
            },
        }
    }
}

/// A GeoJSON feature collection, as returned by the routing backend's
/// `format=geojson` responses and produced by [`concat_segments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }

    /// The LineString feature carrying the route geometry, if any.
    pub fn track_feature(&self) -> Option<&Feature> {
        self.features.iter().find(|f| f.geometry.kind == "LineString")
    }
}

/// One leg's routing response: the track feature for that leg, produced
/// independently by the backend (cumulative counters restart at zero).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub feature: Feature,
}

/// A latitude/longitude pair as supplied by the map UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_feature() {
        let f = Feature::point(8.46, 49.48, "via1", "via");
        assert_eq!(f.geometry.kind, "Point");
        assert_eq!(
            f.geometry.coordinates,
            Coordinates::Point(vec![8.46, 49.48])
        );
        assert_eq!(f.properties.name.as_deref(), Some("via1"));
        assert_eq!(f.properties.kind.as_deref(), Some("via"));
    }

    #[test]
    fn test_geometry_line_accessor() {
        let line = Geometry {
            kind: "LineString".to_string(),
            coordinates: Coordinates::Line(vec![vec![0.0, 0.0], vec![1.0, 1.0]]),
        };
        assert_eq!(line.line().map(|c| c.len()), Some(2));

        let point = Geometry {
            kind: "Point".to_string(),
            coordinates: Coordinates::Point(vec![0.0, 0.0]),
        };
        assert!(point.line().is_none());
    }

    #[test]
    fn test_unknown_property_keys_round_trip() {
        let value = json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [[8.46, 49.48, 101.0], [8.47, 49.49, 102.5]],
            },
            "properties": {
                "name": "Track",
                "track-length": "222",
                "creator": "backend 1.7.8",
                "voicehints": [[1.0, 2.0, 0.0, 111.0]],
            }
        });

        let feature: Feature = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(feature.properties.track_length.as_deref(), Some("222"));
        assert_eq!(
            feature.properties.extra.get("creator"),
            Some(&json!("backend 1.7.8"))
        );
        assert_eq!(
            feature.properties.voicehints,
            Some(vec![vec![1.0, 2.0, 0.0, 111.0]])
        );

        let back = serde_json::to_value(&feature).unwrap();
        assert_eq!(back, value);
    }
}
