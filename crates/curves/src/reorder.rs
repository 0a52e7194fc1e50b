//! Puts the points of a single curve into a drawable order.
//!
//! Contour extraction hands us points in whatever order it walked the
//! outline, which is not always a good stroke order. We guess the two ends
//! of the stroke as the two points farthest apart, walk greedily from each
//! of them, and keep the shorter walk.

use kurbo::Point;

use crate::path_length;

pub fn reorder(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let (a, b) = farthest_pair(points);
    let from_a = greedy_chain(points, a);
    let from_b = greedy_chain(points, b);

    let order = if path_length(&from_a) <= path_length(&from_b) {
        from_a
    } else {
        from_b
    };
    log::trace!("reordered {} points", points.len());
    order
}

/// Indices of the two points that are farthest apart. On ties, the first
/// pair found wins.
fn farthest_pair(points: &[Point]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_dist = -1.0;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = (points[i] - points[j]).hypot2();
            if d > best_dist {
                best_dist = d;
                best = (i, j);
            }
        }
    }
    best
}

/// Starting from `start`, repeatedly hop to the nearest unvisited point.
fn greedy_chain(points: &[Point], start: usize) -> Vec<Point> {
    let mut visited = vec![false; points.len()];
    let mut ret = Vec::with_capacity(points.len());
    let mut cur = start;
    visited[cur] = true;
    ret.push(points[cur]);

    for _ in 1..points.len() {
        let here = points[cur];
        let next = points
            .iter()
            .enumerate()
            .filter(|(i, _)| !visited[*i])
            .min_by(|(_, p), (_, q)| {
                (here - **p).hypot2().total_cmp(&(here - **q).hypot2())
            })
            .map(|(i, _)| i);
        let Some(next) = next else {
            break;
        };
        visited[next] = true;
        ret.push(points[next]);
        cur = next;
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sorted(mut pts: Vec<Point>) -> Vec<(f64, f64)> {
        pts.sort_by(|p, q| p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)));
        pts.into_iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn scrambled_line() {
        let pts = [3.0, 0.0, 4.0, 1.0, 2.0]
            .iter()
            .map(|&x| Point::new(x, 0.0))
            .collect::<Vec<_>>();
        let out = reorder(&pts);
        let xs: Vec<f64> = out.iter().map(|p| p.x).collect();
        // The farthest pair is (0, 4); both walks have length 4 and the first wins.
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn tiny_inputs() {
        assert!(reorder(&[]).is_empty());
        let two = [Point::new(1.0, 1.0), Point::new(0.0, 0.0)];
        assert_eq!(reorder(&two), two.to_vec());
    }

    fn points() -> impl Strategy<Value = Vec<Point>> {
        prop::collection::vec((-100.0..100.0f64, -100.0..100.0f64), 1..40)
            .prop_map(|v| v.into_iter().map(|(x, y)| Point::new(x, y)).collect())
    }

    proptest! {
        #[test]
        fn is_a_permutation(pts in points()) {
            let out = reorder(&pts);
            prop_assert_eq!(sorted(out), sorted(pts));
        }

        // The chosen walk is never longer than either of the walks we tried.
        #[test]
        fn no_longer_than_candidates(pts in points()) {
            prop_assume!(pts.len() > 2);
            let out = reorder(&pts);
            let (a, b) = farthest_pair(&pts);
            let len = path_length(&out);
            prop_assert!(len <= path_length(&greedy_chain(&pts, a)));
            prop_assert!(len <= path_length(&greedy_chain(&pts, b)));
        }
    }
}
