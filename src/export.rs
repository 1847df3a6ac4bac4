//! Export facade.
//!
//! [`RouteExporter`] holds the current route state (the waypoints the
//! user placed and the per-leg responses the backend returned) and runs
//! the full export pipeline: concatenate the legs, append waypoint and
//! POI point features, then render GPX in the requested dialect.

use log::debug;

use crate::concat::concat_segments;
use crate::error::Result;
use crate::gpx::{self, Dialect};
use crate::{Feature, FeatureCollection, LatLng, Segment};

/// A point of interest placed on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    pub latlng: LatLng,
    pub name: String,
}

/// Supplies the POI markers currently placed on the map.
pub trait PoiSource {
    fn markers(&self) -> Vec<Poi>;
}

/// Drives the export pipeline over the current route state.
///
/// `update` is called whenever the route changes; `export` produces the
/// downloadable GPX text.
pub struct RouteExporter {
    waypoints: Vec<LatLng>,
    route: Option<FeatureCollection>,
    pois: Option<Box<dyn PoiSource>>,
}

impl RouteExporter {
    pub fn new(pois: Option<Box<dyn PoiSource>>) -> Self {
        RouteExporter {
            waypoints: Vec::new(),
            route: None,
            pois,
        }
    }

    /// Replace the current route state.
    pub fn update(&mut self, waypoints: Vec<LatLng>, route: Option<FeatureCollection>) {
        self.waypoints = waypoints;
        self.route = route;
    }

    /// The latest merged track, if a route has been computed.
    pub fn route(&self) -> Option<&FeatureCollection> {
        self.route.as_ref()
    }

    /// Concatenate the legs, keep the merged track, and render it.
    pub fn export(&mut self, segments: &[Segment], dialect: Dialect) -> Result<String> {
        let mut track = concat_segments(segments)?;
        self.add_route_waypoints(&mut track);
        self.add_pois(&mut track);
        debug!(
            "exporting track with {} features as {:?}",
            track.features.len(),
            dialect
        );
        let text = gpx::format(&track, dialect)?;
        self.route = Some(track);
        Ok(text)
    }

    /// Append one point feature per route waypoint. The first is named
    /// `from`, the last `to`, the ones between `via1`, `via2` and so on.
    pub fn add_route_waypoints(&self, track: &mut FeatureCollection) {
        let count = self.waypoints.len();
        for (i, latlng) in self.waypoints.iter().enumerate() {
            let (name, kind) = if i == 0 {
                ("from".to_string(), "from")
            } else if i + 1 == count {
                ("to".to_string(), "to")
            } else {
                (format!("via{i}"), "via")
            };
            track
                .features
                .push(Feature::point(latlng.lng, latlng.lat, &name, kind));
        }
    }

    /// Append one point feature per POI marker.
    pub fn add_pois(&self, track: &mut FeatureCollection) {
        let Some(source) = &self.pois else {
            return;
        };
        for poi in source.markers() {
            track
                .features
                .push(Feature::point(poi.latlng.lng, poi.latlng.lat, &poi.name, "poi"));
        }
    }
}
