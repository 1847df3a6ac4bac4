//! Geographic utilities shared by concatenation and hint handling.

use crate::Position;

/// Mean Earth radius in metres.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Great-circle distance between two `[lon, lat, ...]` positions in metres.
pub fn haversine_distance(a: &Position, b: &Position) -> f64 {
    let (lon1, lat1) = (a[0], a[1]);
    let (lon2, lat2) = (b[0], b[1]);

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS * c
}

/// Along-track distance in metres between two vertex indices of a
/// coordinate list. Indices are clamped to the list; an empty or
/// inverted range yields `0.0`.
pub fn along_track_distance(coords: &[Position], from: usize, to: usize) -> f64 {
    let to = to.min(coords.len().saturating_sub(1));
    if from >= to {
        return 0.0;
    }
    coords[from..=to]
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}
