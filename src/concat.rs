//! Segment concatenation.
//!
//! Merges an ordered sequence of per-leg routing responses into a single
//! track whose cumulative fields read as if the whole multi-leg route had
//! been computed in one request:
//! - message rows re-based so time/energy stay monotonic across legs
//! - boundary rows describing the same physical way merged into one
//! - geometry and `times` concatenated without duplicated via vertices
//! - scalar totals summed
//! - voice hints re-indexed, boundary distances recomputed from geometry
//!
//! Inputs are never mutated; all output is freshly constructed, so the
//! operation is idempotent. Arithmetic over the backend's stringified
//! numbers happens in `f64` and is re-stringified: integral values print
//! without a decimal point, everything else in shortest round-trip form.
//! The backend's own rounding already introduces small total-to-segment
//! discrepancies; those are accepted, not corrected.

use log::{debug, warn};

use crate::error::{ExportError, Result};
use crate::geo_utils::along_track_distance;
use crate::hints::{HINT_DISTANCE, HINT_INDEX};
use crate::{Feature, FeatureCollection, Position, Properties, Segment};

/// Message table column: distance covered by the row's way section, metres.
pub const COL_DISTANCE: usize = 3;
/// Message table column: way-tag signature of the section.
pub const COL_WAY_TAGS: usize = 9;
/// Message table column: cumulative time within the segment, seconds.
pub const COL_TIME: usize = 11;
/// Message table column: cumulative energy within the segment, watt-seconds.
pub const COL_ENERGY: usize = 12;

/// Concatenate an ordered sequence of route legs into one track.
///
/// The caller-supplied order is preserved; segments are expected to be
/// geometrically continuous (each leg starting at the previous leg's end
/// point).
///
/// # Example
/// ```
/// use route_export::{concat_segments, Segment};
///
/// let leg: Segment = serde_json::from_value(serde_json::json!({
///     "feature": {
///         "type": "Feature",
///         "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.0, 0.001]] },
///         "properties": { "times": [0.0, 10.0] },
///     }
/// }))
/// .unwrap();
///
/// let track = concat_segments(&[leg]).unwrap();
/// assert_eq!(track.features.len(), 1);
/// ```
pub fn concat_segments(segments: &[Segment]) -> Result<FeatureCollection> {
    let first = segments.first().ok_or(ExportError::EmptySegments)?;
    let mut merged = first.feature.clone();

    // hints keep their source ordinal until the boundary distance fix
    let mut hints = collect_hints(&first.feature, 0, 0)?;
    let mut hints_supplied = first.feature.properties.voicehints.is_some();

    for (ordinal, segment) in segments.iter().enumerate().skip(1) {
        let incoming = &segment.feature;

        merge_messages(&mut merged.properties.messages, &incoming.properties.messages)?;

        let (vertex_offset, shared) = append_geometry(&mut merged, incoming)?;
        append_times(&mut merged.properties.times, &incoming.properties.times, shared);

        hints_supplied |= incoming.properties.voicehints.is_some();
        hints.extend(collect_hints(incoming, ordinal, vertex_offset)?);

        merge_totals(&mut merged.properties, &incoming.properties);
    }

    if let Some(coords) = merged.geometry.line() {
        fix_boundary_distances(&mut hints, coords, segments.len());
    }
    merged.properties.voicehints = if hints_supplied {
        Some(hints.into_iter().map(|(_, row)| row).collect())
    } else {
        None
    };

    Ok(FeatureCollection::new(vec![merged]))
}

/// Append `incoming`'s message data rows onto `base`.
///
/// The incoming header row is skipped (the base already carries one).
/// A row whose way-tag signature equals the last accumulated row's marks
/// the same physical way split across the segment boundary: it is folded
/// into that row instead of appended. All other rows have their
/// cumulative time/energy re-based by the totals accumulated so far, so
/// the merged table stays monotonic end to end.
fn merge_messages(base: &mut Vec<Vec<String>>, incoming: &[Vec<String>]) -> Result<()> {
    if incoming.is_empty() {
        return Ok(());
    }
    if base.is_empty() {
        // first leg carried no messages at all; adopt the table as-is
        base.extend(incoming.iter().cloned());
        return Ok(());
    }

    // carry-over: cumulative totals at the end of the accumulated table
    let (mut offset_time, mut offset_energy) = match base.last().filter(|r| !is_header(r)) {
        Some(last) => (column(last, COL_TIME, 0)?, column(last, COL_ENERGY, 0)?),
        None => (0.0, 0.0),
    };

    let skip = if is_header(&incoming[0]) { 1 } else { 0 };
    for (index, row) in incoming.iter().enumerate().skip(skip) {
        if row.len() <= COL_ENERGY {
            return Err(ExportError::MalformedMessage {
                index,
                detail: format!("expected at least {} columns, got {}", COL_ENERGY + 1, row.len()),
            });
        }

        let mergeable = base
            .last()
            .filter(|last| !is_header(last))
            .is_some_and(|last| last[COL_WAY_TAGS] == row[COL_WAY_TAGS]);

        if mergeable {
            if let Some(last) = base.last_mut() {
                offset_time = column(last, COL_TIME, index)?;
                offset_energy = column(last, COL_ENERGY, index)?;
                last[COL_DISTANCE] =
                    fmt_num(column(last, COL_DISTANCE, index)? + column(row, COL_DISTANCE, index)?);
                last[COL_TIME] = fmt_num(offset_time + column(row, COL_TIME, index)?);
                last[COL_ENERGY] = fmt_num(offset_energy + column(row, COL_ENERGY, index)?);
                debug!("merged boundary rows sharing way tags {}", row[COL_WAY_TAGS]);
            }
        } else {
            let mut row = row.clone();
            row[COL_TIME] = fmt_num(column(&row, COL_TIME, index)? + offset_time);
            row[COL_ENERGY] = fmt_num(column(&row, COL_ENERGY, index)? + offset_energy);
            base.push(row);
        }
    }
    Ok(())
}

/// The backend's first message row names the columns.
fn is_header(row: &[String]) -> bool {
    row.get(COL_DISTANCE).map_or(true, |v| v.parse::<f64>().is_err())
}

fn column(row: &[String], col: usize, index: usize) -> Result<f64> {
    row.get(col)
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| ExportError::MalformedMessage {
            index,
            detail: format!("column {col} is not numeric"),
        })
}

fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Append `incoming`'s coordinates onto the merged geometry.
///
/// Returns the vertex offset for re-basing the incoming segment's point
/// indices, and whether the shared boundary vertex was dropped.
fn append_geometry(merged: &mut Feature, incoming: &Feature) -> Result<(usize, bool)> {
    let coords = incoming
        .geometry
        .line()
        .ok_or_else(|| ExportError::InvalidTrack("segment has no LineString feature".to_string()))?
        .clone();
    let base = merged
        .geometry
        .line_mut()
        .ok_or_else(|| ExportError::InvalidTrack("segment has no LineString feature".to_string()))?;

    let shared = match (base.last(), coords.first()) {
        (Some(a), Some(b)) => positions_equal(a, b),
        _ => false,
    };
    if !shared {
        warn!("segment does not start at the previous segment's end point");
    }

    let offset = if shared { base.len() - 1 } else { base.len() };
    base.extend(coords.into_iter().skip(usize::from(shared)));
    Ok((offset, shared))
}

fn positions_equal(a: &Position, b: &Position) -> bool {
    a.first() == b.first() && a.get(1) == b.get(1)
}

/// Append `incoming`'s cumulative time samples, re-based onto the end of
/// the accumulated sequence. The leading sample of a shared boundary
/// vertex is dropped along with the vertex itself.
fn append_times(base: &mut Vec<f64>, incoming: &[f64], shared: bool) {
    let offset = base.last().copied().unwrap_or(0.0);
    let skip = usize::from(shared && !incoming.is_empty());
    base.extend(incoming.iter().skip(skip).map(|t| round3(t + offset)));
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn merge_totals(base: &mut Properties, incoming: &Properties) {
    add_total(&mut base.track_length, &incoming.track_length);
    add_total(&mut base.total_time, &incoming.total_time);
    add_total(&mut base.total_energy, &incoming.total_energy);
    add_total(&mut base.filtered_ascend, &incoming.filtered_ascend);
    add_total(&mut base.plain_ascend, &incoming.plain_ascend);
    add_total(&mut base.cost, &incoming.cost);
}

fn add_total(base: &mut Option<String>, incoming: &Option<String>) {
    let Some(add) = incoming.as_ref().and_then(|v| v.parse::<f64>().ok()) else {
        return;
    };
    match base.as_ref().and_then(|v| v.parse::<f64>().ok()) {
        Some(current) => *base = Some(fmt_num(current + add)),
        None => *base = incoming.clone(),
    }
}

/// Collect a segment's hint rows with vertex indices re-based onto the
/// merged geometry, tagged with the segment ordinal.
fn collect_hints(
    feature: &Feature,
    ordinal: usize,
    vertex_offset: usize,
) -> Result<Vec<(usize, Vec<f64>)>> {
    let Some(rows) = feature.properties.voicehints.as_ref() else {
        return Ok(Vec::new());
    };
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            if row.len() <= HINT_DISTANCE {
                return Err(ExportError::MalformedVoiceHint {
                    index,
                    detail: format!(
                        "expected at least {} columns, got {}",
                        HINT_DISTANCE + 1,
                        row.len()
                    ),
                });
            }
            let mut row = row.clone();
            row[HINT_INDEX] += vertex_offset as f64;
            Ok((ordinal, row))
        })
        .collect()
}

/// Re-base the distance-to-next of every hint that ends a segment with
/// more segments following. The backend value stops at the segment's end
/// point; the true value spans the gap into the next hint, or to the
/// track end when no hint follows (e.g. trailing segments requested
/// without turn instructions). Recomputed along the merged geometry and
/// rounded to whole metres.
fn fix_boundary_distances(
    hints: &mut [(usize, Vec<f64>)],
    coords: &[Position],
    segment_count: usize,
) {
    for i in 0..hints.len() {
        let ordinal = hints[i].0;
        let last_of_segment = hints
            .get(i + 1)
            .map_or(true, |(next_ordinal, _)| *next_ordinal != ordinal);
        if !last_of_segment || ordinal + 1 >= segment_count {
            continue;
        }

        let from = hints[i].1[HINT_INDEX] as usize;
        let to = hints
            .get(i + 1)
            .map_or(coords.len().saturating_sub(1), |(_, row)| row[HINT_INDEX] as usize);
        if from >= coords.len() || from > to {
            warn!("voice hint vertex {from} outside merged track, keeping backend distance");
            continue;
        }

        let distance = along_track_distance(coords, from, to).round();
        debug!(
            "re-based boundary hint {i}: distance {} -> {}",
            hints[i].1[HINT_DISTANCE], distance
        );
        hints[i].1[HINT_DISTANCE] = distance;
    }
}
