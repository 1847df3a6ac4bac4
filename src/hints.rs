//! Voice-hint model shared by the GPX dialects.
//!
//! The backend attaches turn instructions to a track as a `voicehints`
//! array of fixed-length rows. This module defines the row schema, the
//! closed table of turn commands with their per-app encodings, and the
//! extraction of resolved [`VoiceHint`] values from a track.

use crate::error::{ExportError, Result};
use crate::FeatureCollection;

/// Voice-hint row column: vertex index into the track geometry.
pub const HINT_INDEX: usize = 0;
/// Voice-hint row column: turn command identifier.
pub const HINT_COMMAND: usize = 1;
/// Voice-hint row column: roundabout exit number (0 outside roundabouts).
pub const HINT_EXIT: usize = 2;
/// Voice-hint row column: distance to the next hint, or to the track end,
/// in metres.
pub const HINT_DISTANCE: usize = 3;

/// A turn command the routing backend can announce, with the encodings
/// the supported consumer apps expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnCommand {
    pub id: u8,
    /// Short symbol, e.g. `TL`.
    pub symbol: &'static str,
    /// Human-readable instruction.
    pub message: &'static str,
    /// Turn angle in degrees, negative to the left.
    pub angle: i32,
    /// Locus Map point-action code (base code for roundabouts).
    pub locus: u8,
    /// OruxMaps icon identifier.
    pub orux: u16,
    /// GPSies waypoint symbol name.
    pub gpsies: &'static str,
}

#[rustfmt::skip]
const COMMANDS: &[TurnCommand] = &[
    TurnCommand { id: 1,  symbol: "C",    message: "straight",            angle: 0,    locus: 1,  orux: 1000, gpsies: "straight" },
    TurnCommand { id: 2,  symbol: "TL",   message: "turn left",           angle: -90,  locus: 4,  orux: 1001, gpsies: "left" },
    TurnCommand { id: 3,  symbol: "TSLL", message: "turn slightly left",  angle: -45,  locus: 3,  orux: 1002, gpsies: "slight_left" },
    TurnCommand { id: 4,  symbol: "TSHL", message: "turn sharply left",   angle: -135, locus: 5,  orux: 1003, gpsies: "sharp_left" },
    TurnCommand { id: 5,  symbol: "TR",   message: "turn right",          angle: 90,   locus: 7,  orux: 1004, gpsies: "right" },
    TurnCommand { id: 6,  symbol: "TSLR", message: "turn slightly right", angle: 45,   locus: 6,  orux: 1005, gpsies: "slight_right" },
    TurnCommand { id: 7,  symbol: "TSHR", message: "turn sharply right",  angle: 135,  locus: 8,  orux: 1006, gpsies: "sharp_right" },
    TurnCommand { id: 8,  symbol: "KL",   message: "keep left",           angle: -20,  locus: 9,  orux: 1007, gpsies: "keep_left" },
    TurnCommand { id: 9,  symbol: "KR",   message: "keep right",          angle: 20,   locus: 10, orux: 1008, gpsies: "keep_right" },
    TurnCommand { id: 10, symbol: "TU",   message: "u-turn",              angle: 180,  locus: 12, orux: 1009, gpsies: "uturn" },
    TurnCommand { id: 11, symbol: "TRU",  message: "u-turn right",        angle: 180,  locus: 13, orux: 1010, gpsies: "uturn" },
    TurnCommand { id: 12, symbol: "OFFR", message: "off route",           angle: 0,    locus: 14, orux: 1011, gpsies: "straight" },
    TurnCommand { id: 13, symbol: "RNDB", message: "take exit",           angle: 0,    locus: 27, orux: 1012, gpsies: "roundabout" },
    TurnCommand { id: 14, symbol: "RNLB", message: "take exit (left)",    angle: 0,    locus: 27, orux: 1013, gpsies: "roundabout" },
];

impl TurnCommand {
    /// Look up a command by its backend identifier.
    pub fn from_id(id: u8) -> Option<&'static TurnCommand> {
        COMMANDS.iter().find(|c| c.id == id)
    }

    pub fn is_roundabout(&self) -> bool {
        self.id == 13 || self.id == 14
    }

    /// Instruction text with the roundabout exit folded in.
    pub fn instruction(&self, exit: i32) -> String {
        if self.is_roundabout() && exit > 0 {
            format!("{} {}", self.message, exit)
        } else {
            self.message.to_string()
        }
    }

    /// Short symbol with the roundabout exit folded in, e.g. `RNDB3`.
    pub fn symbol_text(&self, exit: i32) -> String {
        if self.is_roundabout() && exit > 0 {
            format!("{}{}", self.symbol, exit)
        } else {
            self.symbol.to_string()
        }
    }

    /// Locus point-action code; roundabout exits 1-8 map onto dedicated
    /// codes counted up from the base code.
    pub fn locus_action(&self, exit: i32) -> u8 {
        if self.is_roundabout() && (1..=8).contains(&exit) {
            self.locus + exit as u8 - 1
        } else {
            self.locus
        }
    }
}

/// A resolved voice hint, ready for dialect rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceHint {
    /// Vertex index into the track geometry.
    pub index: usize,
    pub command: &'static TurnCommand,
    /// Roundabout exit number, 0 outside roundabouts.
    pub exit: i32,
    /// Distance to the next hint, or to the track end, in metres.
    pub distance: f64,
    /// Longitude of the hint vertex.
    pub lon: f64,
    /// Latitude of the hint vertex.
    pub lat: f64,
    /// Cumulative seconds from the track start to the hint vertex.
    pub time: f64,
}

/// Resolve a track's `voicehints` rows against its geometry and `times`.
///
/// Fails with [`ExportError::MissingVoiceHints`] when the track carries
/// no hints at all, and with [`ExportError::MalformedVoiceHint`] when a
/// row is too short, references a vertex outside the track, or names an
/// unknown command.
pub fn extract_hints(track: &FeatureCollection) -> Result<Vec<VoiceHint>> {
    let feature = track
        .track_feature()
        .ok_or_else(|| ExportError::InvalidTrack("no LineString feature".to_string()))?;
    let coords = feature
        .geometry
        .line()
        .ok_or_else(|| ExportError::InvalidTrack("no LineString feature".to_string()))?;
    let rows = feature
        .properties
        .voicehints
        .as_ref()
        .ok_or(ExportError::MissingVoiceHints)?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() <= HINT_DISTANCE {
                return Err(ExportError::MalformedVoiceHint {
                    index: i,
                    detail: format!(
                        "expected at least {} columns, got {}",
                        HINT_DISTANCE + 1,
                        row.len()
                    ),
                });
            }
            let vertex = row[HINT_INDEX];
            if vertex < 0.0 || vertex as usize >= coords.len() {
                return Err(ExportError::MalformedVoiceHint {
                    index: i,
                    detail: format!("vertex {vertex} outside track"),
                });
            }
            let index = vertex as usize;
            let command = TurnCommand::from_id(row[HINT_COMMAND] as u8).ok_or_else(|| {
                ExportError::MalformedVoiceHint {
                    index: i,
                    detail: format!("unknown command {}", row[HINT_COMMAND]),
                }
            })?;
            Ok(VoiceHint {
                index,
                command,
                exit: row[HINT_EXIT] as i32,
                distance: row[HINT_DISTANCE],
                lon: coords[index][0],
                lat: coords[index][1],
                time: feature.properties.times.get(index).copied().unwrap_or(0.0),
            })
        })
        .collect()
}
