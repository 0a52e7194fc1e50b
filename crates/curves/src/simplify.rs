//! Reduces a curve to roughly a target number of points.

use geo::{EuclideanLength as _, Simplify as _};
use geo_types::LineString;
use kurbo::Point;

const MAX_ITERATIONS: usize = 10;
const GROW: f64 = 1.4;
const SHRINK: f64 = 0.7;

/// Ramer-Douglas-Peucker with a tolerance that gets tuned until the output
/// has between 0.8 and 1.2 times `target_count` points, or until we give up.
///
/// The starting tolerance is 1% of the arc length. Curves that already have
/// at most `target_count` points are returned unchanged.
pub fn simplify(points: &[Point], target_count: usize) -> Vec<Point> {
    if points.len() <= target_count {
        return points.to_vec();
    }

    let line: LineString<f64> = points.iter().map(|p| (p.x, p.y)).collect();
    let target = target_count as f64;
    let mut epsilon = 0.01 * line.euclidean_length();
    let mut simplified = line.simplify(&epsilon);

    for _ in 0..MAX_ITERATIONS {
        let n = simplified.0.len() as f64;
        if n > target * 1.2 {
            epsilon *= GROW;
        } else if n < target * 0.8 {
            epsilon *= SHRINK;
        } else {
            break;
        }
        simplified = line.simplify(&epsilon);
    }

    log::debug!(
        "simplified {} points to {} (target {target_count}, epsilon {epsilon:.3})",
        points.len(),
        simplified.0.len()
    );
    simplified.coords().map(|c| Point::new(c.x, c.y)).collect()
}
