//! Path record and the retraction lattice.

use crate::config::ConfigRef;
use crate::geometry::{polygon_length, IntPoint};

/// Retraction request level. Ordered `None < Requested < Force`; combine
/// with `RetractLevel::max` and never assign directly, so a `Force` request
/// already on a record can never be downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum RetractLevel {
    #[default]
    None,
    Requested,
    Force,
}

impl RetractLevel {
    pub fn max(self, other: RetractLevel) -> RetractLevel {
        std::cmp::max(self, other)
    }
}

/// One contiguous machine action. Mutable while it is the open tail of the
/// planner's queue; frozen once `sealed`.
#[derive(Debug, Clone)]
pub struct PathRecord {
    pub config: ConfigRef,
    pub extruder_index: u32,
    pub points: Vec<IntPoint>,
    pub speed_mm_s: f64,
    pub retract: RetractLevel,
    /// -1 = unchanged, else 0..=100.
    pub fan_percent: i32,
    pub sealed: bool,
}

impl PathRecord {
    pub fn new(config: ConfigRef, extruder_index: u32) -> Self {
        let speed_mm_s = config.speed_mm_s;
        Self {
            config,
            extruder_index,
            points: Vec::new(),
            speed_mm_s,
            retract: RetractLevel::None,
            fan_percent: -1,
            sealed: false,
        }
    }

    /// A record with no points, used to carry a fan command through the
    /// queue without producing motion.
    pub fn new_fan(config: ConfigRef, extruder_index: u32, fan_percent: i32) -> Self {
        let mut rec = Self::new(config, extruder_index);
        rec.fan_percent = fan_percent;
        rec
    }

    /// Appends a point to an open record. Panics (programmer error) if the
    /// record is already sealed.
    pub fn append_point(&mut self, point: IntPoint) {
        assert!(!self.sealed, "append to a sealed PathRecord");
        self.points.push(point);
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Total XY arclength of this record's points, in the order appended.
    /// Does not include the implicit first point.
    pub fn polygon_length(&self) -> i64 {
        polygon_length(&self.points)
    }

    /// True if this is a single-point record whose one point is strictly
    /// closer than `2 * line_width_um` to `reference`.
    pub fn is_tiny_hop_from(&self, line_width_um: i64, reference: &IntPoint) -> bool {
        self.points.len() == 1 && reference.shorter_than(&self.points[0], 2 * line_width_um)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathConfig;

    #[test]
    fn retract_never_downgrades() {
        let mut level = RetractLevel::None;
        level = level.max(RetractLevel::Requested);
        assert_eq!(level, RetractLevel::Requested);
        level = level.max(RetractLevel::Force);
        assert_eq!(level, RetractLevel::Force);
        level = level.max(RetractLevel::None);
        assert_eq!(level, RetractLevel::Force);
    }

    #[test]
    #[should_panic(expected = "sealed")]
    fn append_to_sealed_panics() {
        let cfg: ConfigRef = PathConfig::new(30.0, 400, "WALL-INNER", true, false).into();
        let mut rec = PathRecord::new(cfg, 0);
        rec.seal();
        rec.append_point(IntPoint::new(0, 0));
    }
}
