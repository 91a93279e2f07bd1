//! Inside-boundary router.
//!
//! `route` answers one question: given a travel from one point to another,
//! can it stay fully inside a polygon set, and if so, by which waypoints?
//! The contract does not require optimality, only determinism and
//! loop-freedom, and that no waypoint ever exits the boundary. We implement
//! it with the usual approach for this problem, a visibility graph over
//! the boundary vertices, shortest path by Dijkstra, without claiming that
//! is the only valid implementation; `Router` is a trait so a caller can
//! swap in something cheaper.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use path_types::{IntPoint, PolygonSet};

/// Outcome of a routing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResult {
    /// The straight segment from `from` to `to` already stays inside the
    /// boundary; no waypoints are needed.
    Direct,
    /// A non-empty, ordered list of interior waypoints connecting `from` to
    /// `to`, exclusive of both endpoints.
    Interior(Vec<IntPoint>),
    /// No fully-interior route could be found.
    NoPath,
}

/// Something that can route a travel move inside a boundary.
pub trait Router {
    fn route(
        &self,
        inside_polys: &PolygonSet,
        from: IntPoint,
        to: IntPoint,
        layer_index: u32,
    ) -> RouteResult;
}

/// Visibility-graph router: builds a graph over `from`, `to`, and every
/// polygon vertex, connecting two nodes when the segment between them lies
/// fully inside `inside_polys`, then runs Dijkstra. Deterministic (ties
/// broken by vertex index) and loop-free (Dijkstra never revisits a settled
/// node).
#[derive(Debug, Default)]
pub struct VisibilityRouter;

impl VisibilityRouter {
    pub fn new() -> Self {
        Self
    }
}

impl Router for VisibilityRouter {
    fn route(
        &self,
        inside_polys: &PolygonSet,
        from: IntPoint,
        to: IntPoint,
        _layer_index: u32,
    ) -> RouteResult {
        if inside_polys.is_empty() || from.xy_eq(&to) {
            return RouteResult::Direct;
        }

        if segment_clear(from, to, inside_polys) {
            return RouteResult::Direct;
        }

        let mut nodes: Vec<IntPoint> = vec![from, to];
        for poly in inside_polys {
            nodes.extend(poly.iter().copied());
        }

        let n = nodes.len();
        let mut adj: Vec<Vec<(usize, i64)>> = vec![Vec::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                if nodes[i].xy_eq(&nodes[j]) {
                    continue;
                }
                if segment_clear(nodes[i], nodes[j], inside_polys) {
                    let w = nodes[i].dist(&nodes[j]);
                    adj[i].push((j, w));
                    adj[j].push((i, w));
                }
            }
        }

        match dijkstra(&adj, 0, 1) {
            Some(path) if path.len() >= 2 => {
                let waypoints: Vec<IntPoint> =
                    path[1..path.len() - 1].iter().map(|&idx| nodes[idx]).collect();
                if waypoints.is_empty() {
                    // Dijkstra found a direct edge we failed to classify as
                    // Direct above (shouldn't happen, but stay consistent).
                    RouteResult::Direct
                } else {
                    RouteResult::Interior(waypoints)
                }
            }
            _ => RouteResult::NoPath,
        }
    }
}

#[derive(PartialEq)]
struct HeapEntry {
    cost: i64,
    node: usize,
}
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap via reversed ordering; break ties by node index for
        // determinism.
        other.cost.cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn dijkstra(adj: &[Vec<(usize, i64)>], start: usize, goal: usize) -> Option<Vec<usize>> {
    let n = adj.len();
    let mut dist = vec![i64::MAX; n];
    let mut prev = vec![usize::MAX; n];
    let mut heap = BinaryHeap::new();

    dist[start] = 0;
    heap.push(HeapEntry { cost: 0, node: start });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if node == goal {
            break;
        }
        if cost > dist[node] {
            continue;
        }
        for &(next, w) in &adj[node] {
            let nd = cost.saturating_add(w);
            if nd < dist[next] {
                dist[next] = nd;
                prev[next] = node;
                heap.push(HeapEntry { cost: nd, node: next });
            }
        }
    }

    if dist[goal] == i64::MAX {
        return None;
    }

    let mut path = vec![goal];
    let mut cur = goal;
    while cur != start {
        cur = prev[cur];
        if cur == usize::MAX {
            return None;
        }
        path.push(cur);
    }
    path.reverse();
    Some(path)
}

/// True if the segment `a`-`b` lies fully inside `polys` under the even-odd
/// fill rule: it crosses no polygon edge (other than at a shared endpoint),
/// and its midpoint is inside an odd number of polygons.
fn segment_clear(a: IntPoint, b: IntPoint, polys: &PolygonSet) -> bool {
    for poly in polys {
        if poly.len() < 2 {
            continue;
        }
        for w in 0..poly.len() {
            let c = poly[w];
            let d = poly[(w + 1) % poly.len()];
            if proper_intersection(a, b, c, d) {
                return false;
            }
        }
    }

    let mid = IntPoint::new((a.x + b.x) / 2, (a.y + b.y) / 2);
    point_in_polygon_set(mid, polys)
}

fn point_in_polygon_set(p: IntPoint, polys: &PolygonSet) -> bool {
    let mut inside = false;
    for poly in polys {
        if point_in_polygon(p, poly) {
            inside = !inside;
        }
    }
    inside
}

fn point_in_polygon(p: IntPoint, poly: &[IntPoint]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = poly[i];
        let vj = poly[j];
        let intersects = ((vi.y > p.y) != (vj.y > p.y))
            && ((p.x as f64)
                < (vj.x - vi.x) as f64 * (p.y - vi.y) as f64 / (vj.y - vi.y) as f64 + vi.x as f64);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn orientation(a: IntPoint, b: IntPoint, c: IntPoint) -> i128 {
    let (ax, ay) = (a.x as i128, a.y as i128);
    let (bx, by) = (b.x as i128, b.y as i128);
    let (cx, cy) = (c.x as i128, c.y as i128);
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
}

fn on_segment(p: IntPoint, a: IntPoint, b: IntPoint) -> bool {
    p.x.min(a.x.min(b.x)) <= p.x
        && p.x <= a.x.max(b.x).max(p.x)
        && p.y.min(a.y.min(b.y)) <= p.y
        && p.y <= a.y.max(b.y).max(p.y)
        && orientation(a, b, p) == 0
}

/// True if segments `(a,b)` and `(c,d)` properly cross (not merely touch at
/// a shared endpoint, which routing through a boundary vertex relies on).
fn proper_intersection(a: IntPoint, b: IntPoint, c: IntPoint, d: IntPoint) -> bool {
    if a.xy_eq(&c) || a.xy_eq(&d) || b.xy_eq(&c) || b.xy_eq(&d) {
        return false;
    }
    let o1 = orientation(a, b, c).signum();
    let o2 = orientation(a, b, d).signum();
    let o3 = orientation(c, d, a).signum();
    let o4 = orientation(c, d, b).signum();

    if o1 != o2 && o3 != o4 {
        return true;
    }
    // Collinear overlap counts as blocking too.
    (o1 == 0 && on_segment(c, a, b))
        || (o2 == 0 && on_segment(d, a, b))
        || (o3 == 0 && on_segment(a, c, d))
        || (o4 == 0 && on_segment(b, c, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i64, y0: i64, side: i64) -> Vec<IntPoint> {
        vec![
            IntPoint::new(x0, y0),
            IntPoint::new(x0 + side, y0),
            IntPoint::new(x0 + side, y0 + side),
            IntPoint::new(x0, y0 + side),
        ]
    }

    #[test]
    fn empty_boundary_is_direct() {
        let router = VisibilityRouter::new();
        let result = router.route(&vec![], IntPoint::new(0, 0), IntPoint::new(1000, 1000), 0);
        assert_eq!(result, RouteResult::Direct);
    }

    #[test]
    fn straight_segment_inside_square_is_direct() {
        let router = VisibilityRouter::new();
        let boundary = vec![square(0, 0, 10_000)];
        let result = router.route(&boundary, IntPoint::new(1000, 1000), IntPoint::new(9000, 9000), 0);
        assert_eq!(result, RouteResult::Direct);
    }

    #[test]
    fn routes_around_an_l_shaped_notch() {
        // An L-shaped boundary covering the bottom strip plus the
        // upper-left strip, missing the top-right quadrant. A straight line
        // between a point near the missing corner's bottom side and one
        // near its left side must detour around the reflex vertex.
        let router = VisibilityRouter::new();
        let boundary = vec![vec![
            IntPoint::new(0, 0),
            IntPoint::new(20_000, 0),
            IntPoint::new(20_000, 10_000),
            IntPoint::new(10_000, 10_000),
            IntPoint::new(10_000, 20_000),
            IntPoint::new(0, 20_000),
        ]];
        let from = IntPoint::new(18_000, 3_000);
        let to = IntPoint::new(2_000, 18_000);
        let result = router.route(&boundary, from, to, 0);
        match result {
            RouteResult::Interior(waypoints) => assert!(!waypoints.is_empty()),
            other => panic!("expected an interior route, got {other:?}"),
        }
    }

    #[test]
    fn disjoint_islands_have_no_path() {
        let router = VisibilityRouter::new();
        let boundary = vec![square(0, 0, 1000), square(50_000, 50_000, 1000)];
        let from = IntPoint::new(500, 500);
        let to = IntPoint::new(50_500, 50_500);
        let result = router.route(&boundary, from, to, 0);
        assert_eq!(result, RouteResult::NoPath);
    }
}
