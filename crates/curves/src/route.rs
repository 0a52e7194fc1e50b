//! Orders curves to cut down on pen-up travel.

use crate::Curve;
use kurbo::Point;

/// A nearest-neighbor tour over the curves.
///
/// Each curve is entered at its first point and left at its last. We start at
/// curve 0 and keep jumping to the unvisited curve whose entry is nearest to
/// the current exit. This isn't an optimal tour, but it's quadratic and our
/// curve counts are in the hundreds at most.
///
/// Returns a permutation of `0..curves.len()`.
pub fn tsp_order(curves: &[Curve<Point>]) -> Vec<usize> {
    let n = curves.len();
    if n == 0 {
        return Vec::new();
    }

    // dist[i][j] is the pen-up distance from the end of i to the start of j.
    let ends: Vec<(Point, Point)> = curves
        .iter()
        .map(|c| match (c.points.first(), c.points.last()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => (Point::ZERO, Point::ZERO),
        })
        .collect();
    let dist: Vec<Vec<f64>> = ends
        .iter()
        .map(|(_, exit)| ends.iter().map(|(entry, _)| exit.distance(*entry)).collect())
        .collect();

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut cur = 0;
    visited[cur] = true;
    order.push(cur);

    while order.len() < n {
        let mut best: Option<(usize, f64)> = None;
        for (j, d) in dist[cur].iter().enumerate() {
            if visited[j] {
                continue;
            }
            if best.map_or(true, |(_, best_d)| *d < best_d) {
                best = Some((j, *d));
            }
        }
        let Some((next, _)) = best else {
            break;
        };
        visited[next] = true;
        order.push(next);
        cur = next;
    }
    order
}

/// Rearranges `curves` into the order given by `order`, which should be a
/// permutation as returned by [`tsp_order`].
pub fn apply_order<P>(curves: Vec<Curve<P>>, order: &[usize]) -> Vec<Curve<P>> {
    let mut slots: Vec<Option<Curve<P>>> = curves.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots.get_mut(i)?.take()).collect()
}

/// Total pen-up distance when drawing `curves` in order.
pub fn travel_length(curves: &[Curve<Point>]) -> f64 {
    curves
        .windows(2)
        .filter_map(|w| Some(w[0].points.last()?.distance(*w[1].points.first()?)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seg(id: u32, x0: f64, x1: f64) -> Curve<Point> {
        Curve::new(id, vec![Point::new(x0, 0.0), Point::new(x1, 0.0)])
    }

    #[test]
    fn follows_nearest_entry() {
        let curves = vec![seg(1, 0.0, 1.0), seg(2, 10.0, 11.0), seg(3, 2.0, 3.0), seg(4, 5.0, 6.0)];
        let order = tsp_order(&curves);
        assert_eq!(order, vec![0, 2, 3, 1]);

        let before = travel_length(&curves);
        let ids: Vec<u32> = apply_order(curves.clone(), &order)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 4, 2]);
        assert!(travel_length(&apply_order(curves, &order)) < before);
    }

    #[test]
    fn empty_and_single() {
        assert!(tsp_order(&[]).is_empty());
        assert_eq!(tsp_order(&[seg(7, 0.0, 1.0)]), vec![0]);
    }

    proptest! {
        #[test]
        fn visits_every_curve_once(
            ends in prop::collection::vec((-50.0..50.0f64, -50.0..50.0f64, -50.0..50.0f64), 0..60)
        ) {
            let curves: Vec<_> = ends
                .iter()
                .enumerate()
                .map(|(i, &(x0, x1, y))| {
                    Curve::new(i as u32 + 1, vec![Point::new(x0, y), Point::new(x1, -y)])
                })
                .collect();
            let mut order = tsp_order(&curves);
            prop_assert_eq!(order.len(), curves.len());
            order.sort_unstable();
            prop_assert_eq!(order, (0..curves.len()).collect::<Vec<_>>());
        }
    }
}
