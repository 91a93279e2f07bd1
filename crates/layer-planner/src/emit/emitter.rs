//! Emitter.
//!
//! Walks sealed `PathRecord`s in order and drives a [`Sink`]: tool switches,
//! retractions, `TYPE:` comments, fan commands, then one of three emission
//! modes per record (small-move coalescing, spiralize Z ramp, or a normal
//! path with optional perimeter-overlap trim).

use path_types::config::{TAG_WALL_INNER, TAG_WALL_OUTER};
use path_types::{polygon_length, trim, ConfigRef, IntPoint, PathRecord, RetractLevel};

use crate::emit::sink::Sink;

/// Drains `records` into `sink`. `entry_position` is the machine's position
/// before the first record (its implicit first point); `entry_extruder` is
/// the extruder already active at that point, so record 0 only triggers a
/// tool switch when it genuinely names a different extruder; `layer_thickness`
/// feeds the spiralize Z ramp; `perimeter_overlap_ratio` controls overlap
/// trim on closed WALL-OUTER / WALL-INNER loops; `layer_time_seconds` is
/// whatever `finalize_layer` computed, reported to the sink exactly once at
/// the end.
pub fn emit(
    records: &[PathRecord],
    entry_position: IntPoint,
    entry_extruder: u32,
    layer_thickness: i64,
    perimeter_overlap_ratio: f64,
    layer_time_seconds: f64,
    sink: &mut dyn Sink,
) {
    if records.is_empty() {
        return;
    }

    let mut current_pos = entry_position;
    let mut current_extruder = entry_extruder;
    let mut last_emitted_config: Option<ConfigRef> = None;

    let mut i = 0;
    while i < records.len() {
        let rec = &records[i];

        if current_extruder != rec.extruder_index {
            sink.switch_extruder(rec.extruder_index);
            current_extruder = rec.extruder_index;
        } else if rec.retract != RetractLevel::None {
            let estimate = if rec.config.is_travel() {
                let first = rec.points.first().copied().unwrap_or(current_pos);
                (current_pos.dist(&first) + polygon_length(&rec.points)) as f64 / 1000.0 / rec.speed_mm_s
            } else {
                0.0
            };
            sink.write_retraction(estimate, rec.retract == RetractLevel::Force);
        }

        let config_changed = last_emitted_config.as_ref() != Some(&rec.config);
        if config_changed && !rec.config.is_travel() {
            sink.write_comment(&rec.config.comment_tag);
            last_emitted_config = Some(rec.config.clone());
        }

        if rec.fan_percent != -1 {
            sink.write_fan(rec.fan_percent);
        }

        if rec.points.is_empty() {
            i += 1;
            continue;
        }

        if is_tiny_hop_candidate(rec, &current_pos) {
            let run_end = scan_coalescible_run(records, i, current_pos);
            if run_end - i > 2 {
                current_pos = emit_coalesced_run(records, i, run_end, current_pos, sink);
                i = run_end;
                continue;
            }
        }

        if rec.config.spiralize && !later_record_also_spiralizes(records, i) {
            current_pos = emit_spiralize(rec, current_pos, layer_thickness, sink);
        } else {
            current_pos = emit_normal(rec, current_pos, perimeter_overlap_ratio, sink);
        }
        i += 1;
    }

    sink.update_layer_print_time(layer_time_seconds);
}

fn is_tiny_hop_candidate(rec: &PathRecord, current_pos: &IntPoint) -> bool {
    !rec.config.is_travel() && rec.is_tiny_hop_from(rec.config.line_width_um, current_pos)
}

/// Extends the run of single-point tiny hops starting at `start`, then
/// excludes a trailing travel-config record from it.
fn scan_coalescible_run(records: &[PathRecord], start: usize, current_pos: IntPoint) -> usize {
    let mut end = start;
    let mut reference = current_pos;
    while end < records.len() {
        let r = &records[end];
        if !r.is_tiny_hop_from(r.config.line_width_um, &reference) {
            break;
        }
        reference = r.points[0];
        end += 1;
    }
    if end > start && records[end - 1].config.is_travel() {
        end -= 1;
    }
    end
}

/// Pairs up `records[start..end-1]`, emitting one volume-preserving midpoint
/// move per pair, then always finishes with a normal move to the run's true
/// final point.
fn emit_coalesced_run(
    records: &[PathRecord],
    start: usize,
    end: usize,
    current_pos: IntPoint,
    sink: &mut dyn Sink,
) -> IntPoint {
    let mut pos = current_pos;
    let mut k = start;
    let body_end = end - 1;

    while body_end - k >= 2 {
        let a = &records[k];
        let b = &records[k + 1];
        let pa = a.points[0];
        let pb = b.points[0];
        let midpoint = IntPoint::new((pa.x + pb.x) / 2, (pa.y + pb.y) / 2);

        let original_len = pos.dist(&pa) + pa.dist(&pb);
        let new_len = pos.dist(&midpoint).max(1);
        let width = ((a.config.line_width_um as f64 * original_len as f64) / new_len as f64).round() as i64;

        sink.write_move(&midpoint, a.speed_mm_s, width);
        pos = midpoint;
        k += 2;
    }

    if k < body_end {
        let r = &records[k];
        let p = r.points[0];
        sink.write_move(&p, r.speed_mm_s, r.config.line_width_um);
        pos = p;
        k += 1;
    }

    let last = &records[end - 1];
    let p = last.points[0];
    sink.write_move(&p, last.speed_mm_s, last.config.line_width_um);
    let _ = k;
    p
}

fn later_record_also_spiralizes(records: &[PathRecord], index: usize) -> bool {
    records[(index + 1)..].iter().any(|r| r.config.spiralize)
}

/// Ramps Z across the record's points in proportion to cumulative arclength
/// from `current_pos`. `current_pos.z` is the base Z this
/// record ramps away from.
fn emit_spiralize(rec: &PathRecord, current_pos: IntPoint, layer_thickness: i64, sink: &mut dyn Sink) -> IntPoint {
    let z_base = current_pos.z.unwrap_or(0);

    let mut total = 0i64;
    let mut prev = current_pos;
    for p in &rec.points {
        total += prev.dist(p);
        prev = *p;
    }

    let mut pos = current_pos;
    let mut cumulative = 0i64;
    for p in &rec.points {
        cumulative += pos.dist(p);
        let frac = if total > 0 { cumulative as f64 / total as f64 } else { 1.0 };
        let z = z_base + (layer_thickness as f64 * frac + 0.5).floor() as i64;
        let width = p.width.unwrap_or(rec.config.line_width_um);
        let stamped = p.with_z_value(z);
        sink.write_move(&stamped, rec.speed_mm_s, width);
        pos = *p;
    }
    pos
}

/// Emits the record's points directly, trimming for perimeter overlap first
/// when this is a closed WALL-OUTER/WALL-INNER loop and the ratio calls for
/// it.
fn emit_normal(rec: &PathRecord, current_pos: IntPoint, perimeter_overlap_ratio: f64, sink: &mut dyn Sink) -> IntPoint {
    let loop_start = current_pos;
    let is_perimeter = rec.config.comment_tag == TAG_WALL_OUTER || rec.config.comment_tag == TAG_WALL_INNER;
    let closed_in_data = rec.points.last().is_some_and(|p| p.xy_eq(&loop_start));

    let trimmed;
    let (points, did_trim): (&[IntPoint], bool) = if is_perimeter && closed_in_data && perimeter_overlap_ratio < 1.0
    {
        let trim_dist = (rec.config.line_width_um as f64 * (1.0 - perimeter_overlap_ratio)).round() as i64;
        trimmed = trim(&rec.points, trim_dist);
        (&trimmed, true)
    } else {
        (&rec.points, false)
    };

    let mut pos = current_pos;
    for p in points {
        let width = p.width.unwrap_or(rec.config.line_width_um);
        sink.write_move(p, rec.speed_mm_s, width);
        pos = *p;
    }

    if did_trim {
        sink.write_move(&loop_start.with_width(0), rec.speed_mm_s, 0);
        pos = loop_start;
    }
    pos
}
