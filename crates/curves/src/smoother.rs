use kurbo::Point;

use crate::RawCurve;

/// Chaikin corner cutting.
///
/// Each pass replaces every edge `p -> q` by the two points a quarter of the
/// way in from either end, so sharp corners get shaved off. The first and
/// last points of the curve stay put so that strokes still start and end
/// where they did. Curves with fewer than three points have no corners and
/// are left alone.
pub fn chaikin(points: &[Point], iterations: usize) -> Vec<Point> {
    let mut cur = points.to_vec();
    if cur.len() < 3 {
        return cur;
    }

    for _ in 0..iterations {
        let mut next = Vec::with_capacity(cur.len() * 2);
        next.push(cur[0]);
        for w in cur.windows(2) {
            next.push(w[0].lerp(w[1], 0.25));
            next.push(w[0].lerp(w[1], 0.75));
        }
        next.push(cur[cur.len() - 1]);
        cur = next;
    }
    cur
}

pub fn smooth_all(curves: &mut [RawCurve], iterations: usize) {
    if iterations == 0 {
        return;
    }
    for c in curves {
        c.points = chaikin(&c.points, iterations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
        ];
        let out = chaikin(&pts, 1);
        assert_eq!(
            out,
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(3.0, 0.0),
                Point::new(4.0, 1.0),
                Point::new(4.0, 3.0),
                Point::new(4.0, 4.0),
            ]
        );
        // The corner itself is gone.
        assert!(!out.contains(&Point::new(4.0, 0.0)));
    }

    #[test]
    fn growth_and_fixed_ends() {
        let pts: Vec<_> = (0..5)
            .map(|i| Point::new(i as f64, (i % 2) as f64))
            .collect();
        let out = chaikin(&pts, 3);
        // Each pass doubles the point count.
        assert_eq!(out.len(), 40);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[out.len() - 1], pts[4]);
    }

    #[test]
    fn short_curves_untouched() {
        let pts = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        assert_eq!(chaikin(&pts, 4), pts.to_vec());
    }
}
