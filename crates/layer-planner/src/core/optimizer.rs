//! Order optimizer.
//!
//! Given a set of polygons and a start point, chooses a traversal order and
//! a per-polygon start vertex that approximately minimizes total travel,
//! deferring any polygon the router reports as unreachable from the current
//! position to the end of the order. Exactness is not required here; this
//! is a greedy nearest-candidate heuristic, run in O(|P|^2), which is fine
//! for layers with hundreds of polygons.

use path_types::{IntPoint, Polygon, PolygonSet};

use crate::core::router::{RouteResult, Router};

/// Result of ordering a set of polygons for travel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedOrder {
    /// Permutation of `0..polys.len()`.
    pub order: Vec<usize>,
    /// For each polygon (indexed by its position in the *input* slice, not
    /// `order`), the vertex index to begin printing at.
    pub start_index: Vec<usize>,
}

/// Orders `polys` for minimal approximate travel starting from `start`.
/// `closed_loop` says whether every polygon in this set is walked as a
/// closed loop (any vertex is a valid start, and traversal returns to that
/// vertex) or as an open path (only index 0 or the last index are valid
/// ends, per `queue_polygon`'s reversal rule). If `router` and `boundary`
/// are both given, a polygon with no reachable candidate start from the
/// current position is deferred after every reachable one.
pub fn order_polygons(
    polys: &[Polygon],
    start: IntPoint,
    closed_loop: bool,
    router: Option<(&dyn Router, &PolygonSet, u32)>,
) -> OptimizedOrder {
    let n = polys.len();
    let mut start_index = vec![0usize; n];
    let mut order = Vec::with_capacity(n);
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut current = start;

    while !remaining.is_empty() {
        let mut best_reachable: Option<(usize, usize, i64, usize)> = None; // (pos-in-remaining, poly idx, dist, start vertex)
        let mut best_any: Option<(usize, usize, i64, usize)> = None;

        for (pos, &poly_idx) in remaining.iter().enumerate() {
            let poly = &polys[poly_idx];
            if poly.is_empty() {
                continue;
            }
            let (candidate_start, dist) = best_candidate_start(poly, current, closed_loop);
            let reachable = match router {
                Some((r, boundary, layer)) => {
                    !matches!(r.route(boundary, current, poly[candidate_start], layer), RouteResult::NoPath)
                }
                None => true,
            };

            let entry = (pos, poly_idx, dist, candidate_start);
            if entry_is_better(&best_any, &entry) {
                best_any = Some(entry);
            }
            if reachable && entry_is_better(&best_reachable, &entry) {
                best_reachable = Some(entry);
            }
        }

        let chosen = best_reachable.or(best_any).expect("remaining is non-empty");
        let (pos, poly_idx, _dist, chosen_start) = chosen;
        start_index[poly_idx] = chosen_start;
        order.push(poly_idx);
        remaining.remove(pos);

        let poly = &polys[poly_idx];
        current = end_position(poly, chosen_start, closed_loop);
    }

    OptimizedOrder { order, start_index }
}

fn entry_is_better(best: &Option<(usize, usize, i64, usize)>, candidate: &(usize, usize, i64, usize)) -> bool {
    match best {
        None => true,
        Some(b) => candidate.2 < b.2,
    }
}

/// Picks the best vertex of `poly` to start from, given the incoming point.
/// For closed loops every vertex is a candidate; for open paths only the
/// two ends (index 0 and the last index) are. Ties are broken by preferring
/// the candidate closest to `from` (trivially satisfied since we minimize
/// distance to `from` directly).
fn best_candidate_start(poly: &Polygon, from: IntPoint, closed_loop: bool) -> (usize, i64) {
    let candidates: Vec<usize> = if closed_loop {
        (0..poly.len()).collect()
    } else if poly.len() == 1 {
        vec![0]
    } else {
        vec![0, poly.len() - 1]
    };

    candidates
        .into_iter()
        .map(|idx| (idx, from.dist(&poly[idx])))
        .min_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .expect("poly is non-empty")
}

/// Where the head ends up after printing `poly` starting at `start_index`.
fn end_position(poly: &Polygon, start_index: usize, closed_loop: bool) -> IntPoint {
    if closed_loop {
        // A closed loop returns to its own start vertex.
        poly[start_index]
    } else if start_index == 0 {
        poly[poly.len() - 1]
    } else {
        poly[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: i64, y0: i64, side: i64) -> Polygon {
        vec![
            IntPoint::new(x0, y0),
            IntPoint::new(x0 + side, y0),
            IntPoint::new(x0 + side, y0 + side),
            IntPoint::new(x0, y0 + side),
        ]
    }

    #[test]
    fn orders_by_nearest_first() {
        let near = square(0, 0, 1000);
        let far = square(100_000, 100_000, 1000);
        let polys = vec![far.clone(), near.clone()];
        let result = order_polygons(&polys, IntPoint::new(0, 0), true, None);
        assert_eq!(result.order, vec![1, 0]);
    }

    #[test]
    fn closed_loop_picks_nearest_vertex() {
        let poly = square(10_000, 10_000, 1000);
        let polys = vec![poly];
        // Start near the top-right corner of the square.
        let result = order_polygons(&polys, IntPoint::new(11_500, 11_500), true, None);
        assert_eq!(result.start_index[0], 2); // (11000, 11000)
    }

    #[test]
    fn unreachable_polygon_is_deferred() {
        struct AlwaysNoPath;
        impl Router for AlwaysNoPath {
            fn route(
                &self,
                _inside: &PolygonSet,
                from: IntPoint,
                to: IntPoint,
                _layer: u32,
            ) -> RouteResult {
                if from.x < 50_000 && to.x > 50_000 {
                    RouteResult::NoPath
                } else {
                    RouteResult::Direct
                }
            }
        }

        let near_but_blocked = square(60_000, 0, 1000);
        let far_but_open = square(0, 100_000, 1000);
        let polys = vec![near_but_blocked, far_but_open];
        let router = AlwaysNoPath;
        let boundary: PolygonSet = vec![];
        let result = order_polygons(
            &polys,
            IntPoint::new(0, 0),
            true,
            Some((&router, &boundary, 0)),
        );
        // The nearer polygon is unreachable from the start, so the farther
        // but reachable one is printed first.
        assert_eq!(result.order, vec![1, 0]);
    }
}
