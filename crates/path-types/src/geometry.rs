//! Integer-point geometry for planning.
//!
//! All coordinates are signed integer micrometres. Millimetre values are
//! derived only at the edges (time/speed math), never carried through the
//! core arithmetic, so that accumulated rounding error cannot creep into
//! geometric comparisons.

use serde::{Deserialize, Serialize};

/// One point in a path, in micrometres.
///
/// `z` is optional because most planning happens in a single layer's XY
/// plane; it is populated by the spiralize Z ramp and by `queue_extrusion`'s
/// implicit Z stamping. `width` is an extrusion-width override for just this
/// segment: `None` means "use the governing config's width", `Some(0)` means
/// "travel-style, do not extrude here" even inside an otherwise extruding
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntPoint {
    pub x: i64,
    pub y: i64,
    pub z: Option<i64>,
    pub width: Option<i64>,
}

impl IntPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y, z: None, width: None }
    }

    pub fn with_z(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z: Some(z), width: None }
    }

    pub fn with_width(mut self, width: i64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_z_value(mut self, z: i64) -> Self {
        self.z = Some(z);
        self
    }

    /// XY-only equality, ignoring Z and width overrides.
    pub fn xy_eq(&self, other: &IntPoint) -> bool {
        self.x == other.x && self.y == other.y
    }

    fn sub(&self, other: &IntPoint) -> (i64, i64) {
        (self.x - other.x, self.y - other.y)
    }

    /// Squared XY distance, avoiding a square root.
    pub fn dist_sq(&self, other: &IntPoint) -> i128 {
        let (dx, dy) = self.sub(other);
        (dx as i128) * (dx as i128) + (dy as i128) * (dy as i128)
    }

    /// XY Euclidean distance in micrometres, saturating to i64::MAX.
    pub fn dist(&self, other: &IntPoint) -> i64 {
        let sq = self.dist_sq(other) as f64;
        let d = sq.sqrt();
        if d >= i64::MAX as f64 { i64::MAX } else { d as i64 }
    }

    /// XY Manhattan distance in micrometres.
    pub fn manhattan_dist(&self, other: &IntPoint) -> i64 {
        let (dx, dy) = self.sub(other);
        dx.abs() + dy.abs()
    }

    /// Distance in millimetres, derived last from the micrometre distance.
    pub fn dist_mm(&self, other: &IntPoint) -> f64 {
        self.dist(other) as f64 / 1000.0
    }

    /// True if the XY distance to `other` exceeds `d` micrometres, without
    /// computing a square root.
    pub fn longer_than(&self, other: &IntPoint, d: i64) -> bool {
        if d <= 0 {
            return self.dist_sq(other) > 0;
        }
        self.dist_sq(other) > (d as i128) * (d as i128)
    }

    /// True if the XY distance to `other` is less than `d` micrometres,
    /// without computing a square root.
    pub fn shorter_than(&self, other: &IntPoint, d: i64) -> bool {
        if d <= 0 {
            return false;
        }
        self.dist_sq(other) < (d as i128) * (d as i128)
    }
}

/// An ordered sequence of points. Closedness is a property of the config
/// under which the polygon is walked, not of this data.
pub type Polygon = Vec<IntPoint>;

/// An unordered collection of polygons: an island's outline plus its holes.
pub type PolygonSet = Vec<Polygon>;

/// Total XY arclength of `poly`, summing consecutive segment lengths in the
/// order given. Does not wrap from the last point back to the first; callers
/// that want a closed loop's length must include the repeated start point.
pub fn polygon_length(poly: &[IntPoint]) -> i64 {
    poly.windows(2).map(|w| w[0].dist(&w[1])).sum()
}

/// Returns a new polygon whose total arclength, measured from the first
/// point, is shortened by `distance` micrometres removed from the tail,
/// interpolating a new final point along the last surviving segment.
///
/// Trimming by a distance exceeding the polygon's length yields an empty
/// polygon. Trimming by 0 returns the polygon unchanged (up to floating
/// point of the interpolation, which is skipped entirely when `distance` is
/// exactly 0), so `trim(trim(poly, d), 0) == trim(poly, d)`.
pub fn trim(poly: &[IntPoint], distance: i64) -> Polygon {
    if distance <= 0 || poly.is_empty() {
        return poly.to_vec();
    }

    let total = polygon_length(poly);
    if distance >= total {
        return Vec::new();
    }

    let keep = total - distance;
    let mut acc: i64 = 0;
    let mut out = Vec::with_capacity(poly.len());
    if poly.is_empty() {
        return out;
    }
    out.push(poly[0]);

    for w in poly.windows(2) {
        let (a, b) = (w[0], w[1]);
        let seg_len = a.dist(&b);
        if seg_len == 0 {
            continue;
        }
        if acc + seg_len < keep {
            acc += seg_len;
            out.push(b);
            continue;
        }

        // `keep` falls inside this segment (or exactly at its end):
        // interpolate the final point and stop.
        let remaining = keep - acc;
        let t = remaining as f64 / seg_len as f64;
        let x = a.x + ((b.x - a.x) as f64 * t).round() as i64;
        let y = a.y + ((b.y - a.y) as f64 * t).round() as i64;
        out.push(IntPoint::new(x, y));
        return out;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dist_is_pythagorean() {
        let a = IntPoint::new(0, 0);
        let b = IntPoint::new(3000, 4000);
        assert_eq!(a.dist(&b), 5000);
    }

    #[test]
    fn longer_than_avoids_equal_case() {
        let a = IntPoint::new(0, 0);
        let b = IntPoint::new(2000, 0);
        assert!(!a.longer_than(&b, 2000));
        assert!(a.longer_than(&b, 1999));
        assert!(!a.shorter_than(&b, 2000));
        assert!(a.shorter_than(&b, 2001));
    }

    #[test]
    fn polygon_length_sums_segments() {
        let poly = vec![
            IntPoint::new(0, 0),
            IntPoint::new(10_000, 0),
            IntPoint::new(10_000, 10_000),
        ];
        assert_eq!(polygon_length(&poly), 20_000);
    }

    #[test]
    fn trim_past_length_is_empty() {
        let poly = vec![IntPoint::new(0, 0), IntPoint::new(1000, 0)];
        assert!(trim(&poly, 5000).is_empty());
    }

    #[test]
    fn trim_interpolates_on_last_segment() {
        let poly = vec![
            IntPoint::new(0, 0),
            IntPoint::new(10_000, 0),
            IntPoint::new(10_000, 10_000),
        ];
        // total = 20_000, trim 5_000 -> keep 15_000, lands 5_000 into the
        // second segment.
        let trimmed = trim(&poly, 5_000);
        assert_eq!(trimmed.last().unwrap().x, 10_000);
        assert_eq!(trimmed.last().unwrap().y, 5_000);
    }

    #[test]
    fn trim_by_d_then_zero_is_idempotent() {
        let poly = vec![
            IntPoint::new(0, 0),
            IntPoint::new(10_000, 0),
            IntPoint::new(10_000, 10_000),
        ];
        let once = trim(&poly, 5_000);
        let twice = trim(&once, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn int_point_round_trips_through_json() {
        let p = IntPoint::with_z(1000, -2000, 200).with_width(400);
        let text = serde_json::to_string(&p).unwrap();
        let back: IntPoint = serde_json::from_str(&text).unwrap();
        assert_eq!(p, back);
    }
}
