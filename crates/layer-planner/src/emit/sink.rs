//! Emission sink: the narrow interface the emitter drives.
//!
//! Keeping this a trait, rather than writing strings directly, draws a
//! seam between "decide what happens" and "decide how it's written down".
//! `TextGcodeSink` is the reference implementation; a binary dialect or an
//! in-memory command buffer can implement `Sink` without the emitter
//! changing at all.

use path_types::IntPoint;

/// Everything the emitter needs to hand off one layer's motion.
pub trait Sink: Send + Sync {
    /// A tool change is about to happen; `extruder_index` is the new one.
    fn switch_extruder(&mut self, extruder_index: u32);

    /// A retraction should happen now, before the next move.
    /// `estimated_move_time_s` is the emitter's estimate of how long the
    /// about-to-happen move will take, for firmware that scales retract
    /// speed to it; `forced` is true iff the record's level was `Force`.
    fn write_retraction(&mut self, estimated_move_time_s: f64, forced: bool);

    /// A `TYPE:` style comment marking what follows, e.g. `"WALL-OUTER"`.
    fn write_comment(&mut self, tag: &str);

    /// Sets the part-cooling fan to `percent` (0..=100).
    fn write_fan(&mut self, percent: i32);

    /// One motion command: move to `point` at `speed_mm_s`, depositing
    /// material at `line_width_um` (0 means travel-style, no deposition).
    fn write_move(&mut self, point: &IntPoint, speed_mm_s: f64, line_width_um: i64);

    /// Reports the finalized estimate for how long this layer takes to
    /// print, once per layer, after every move has been written.
    fn update_layer_print_time(&mut self, seconds: f64);
}

/// Human-readable reference sink. Accumulates lines in memory; intended for
/// tests, previews, and the demo CLI rather than a real machine feed.
#[derive(Debug, Default, Clone)]
pub struct TextGcodeSink {
    lines: Vec<String>,
}

impl TextGcodeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl Sink for TextGcodeSink {
    fn switch_extruder(&mut self, extruder_index: u32) {
        self.lines.push(format!("T{extruder_index}"));
    }

    fn write_retraction(&mut self, estimated_move_time_s: f64, forced: bool) {
        let kind = if forced { "forced" } else { "requested" };
        self.lines.push(format!("G10 ; retract ({kind}, move~{estimated_move_time_s:.3}s)"));
    }

    fn write_comment(&mut self, tag: &str) {
        self.lines.push(format!(";TYPE:{tag}"));
    }

    fn write_fan(&mut self, percent: i32) {
        if percent <= 0 {
            self.lines.push("M107".to_string());
        } else {
            let speed = (percent as f64 / 100.0 * 255.0).round() as i32;
            self.lines.push(format!("M106 S{speed}"));
        }
    }

    fn write_move(&mut self, point: &IntPoint, speed_mm_s: f64, line_width_um: i64) {
        let code = if line_width_um > 0 { "G1" } else { "G0" };
        let feed = speed_mm_s * 60.0;
        let mut line = format!(
            "{code} X{:.3} Y{:.3} F{:.0}",
            point.x as f64 / 1000.0,
            point.y as f64 / 1000.0,
            feed
        );
        if let Some(z) = point.z {
            line.push_str(&format!(" Z{:.3}", z as f64 / 1000.0));
        }
        if line_width_um > 0 {
            line.push_str(&format!(" ; width={line_width_um}um"));
        }
        self.lines.push(line);
    }

    fn update_layer_print_time(&mut self, seconds: f64) {
        self.lines.push(format!("; estimated layer time: {seconds:.2}s"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_zero_emits_off_command() {
        let mut sink = TextGcodeSink::new();
        sink.write_fan(0);
        assert_eq!(sink.lines(), &["M107".to_string()]);
    }

    #[test]
    fn travel_move_uses_g0() {
        let mut sink = TextGcodeSink::new();
        sink.write_move(&IntPoint::new(1000, 2000), 120.0, 0);
        assert!(sink.lines()[0].starts_with("G0"));
    }

    #[test]
    fn extrusion_move_uses_g1() {
        let mut sink = TextGcodeSink::new();
        sink.write_move(&IntPoint::new(1000, 2000), 30.0, 400);
        assert!(sink.lines()[0].starts_with("G1"));
    }
}
