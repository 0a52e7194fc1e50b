//! Curve lists and the geometry we do on them before they meet the arm:
//! simplification, point reordering, routing between curves, and the
//! affine layout onto the page.
//!
//! A curve is an ordered run of points drawn with the pen down. Moving from
//! one curve to the next is a pen-up move.

use fivebar_geom::LinkagePose;
use kurbo::{Point, Rect};

pub mod csv;
pub mod layout;
pub mod reorder;
pub mod route;
pub mod simplify;
pub mod smoother;
pub mod svg;
pub mod transform;

pub use layout::Layout;

pub type CurveId = u32;

#[derive(Clone, Debug, PartialEq)]
pub struct Curve<P> {
    pub id: CurveId,
    pub points: Vec<P>,
}

impl<P> Curve<P> {
    pub fn new(id: CurveId, points: Vec<P>) -> Self {
        Self { id, points }
    }
}

/// A curve straight from the extraction stage, or after any of the 2d
/// transforms in this crate.
pub type RawCurve = Curve<Point>;

/// A curve whose points have been run through inverse kinematics.
pub type ResolvedCurve = Curve<ResolvedPoint>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedPoint {
    pub point: Point,
    /// `None` if no acceptable pose reaches this point.
    pub pose: Option<LinkagePose>,
}

#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("the curve list is empty")]
    EmptyCurveList,
    #[error("curves have a degenerate bounding box ({width} x {height})")]
    DegenerateBounds { width: f64, height: f64 },
    #[error("expected header {expected:?}, found {found:?}")]
    Header { expected: String, found: String },
    #[error("csv: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("svg: {0}")]
    Svg(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CurveError>;

/// A value read from a file, along with the number of rows we had to skip.
#[derive(Clone, Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub rejected_rows: usize,
}

/// The bounding box of every point in every curve, or `None` if there
/// are no points at all.
pub fn bounding_box(curves: &[RawCurve]) -> Option<Rect> {
    let mut points = curves.iter().flat_map(|c| c.points.iter());
    let first = points.next()?;
    Some(points.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)))
}

/// The length of the polyline through `points`, in order.
pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_spans_all_curves() {
        let curves = vec![
            Curve::new(1, vec![Point::new(1.0, 2.0), Point::new(3.0, -1.0)]),
            Curve::new(4, vec![Point::new(-2.0, 5.0)]),
        ];
        assert_eq!(
            bounding_box(&curves),
            Some(Rect::new(-2.0, -1.0, 3.0, 5.0))
        );
        assert_eq!(bounding_box(&[]), None);
    }

    #[test]
    fn length() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 0.0),
        ];
        assert_eq!(path_length(&pts), 9.0);
        assert_eq!(path_length(&pts[..1]), 0.0);
    }
}
