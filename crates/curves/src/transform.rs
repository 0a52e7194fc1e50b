//! Affine transforms applied to a whole curve list at once.

use kurbo::{Affine, Vec2};

use crate::{bounding_box, CurveError, RawCurve, Result};

pub fn apply_affine(curves: &mut [RawCurve], transform: Affine) {
    for p in curves.iter_mut().flat_map(|c| c.points.iter_mut()) {
        *p = transform * *p;
    }
}

/// Rotates every point about the origin, counter-clockwise by `degrees`.
pub fn rotate(curves: &mut [RawCurve], degrees: f64) {
    apply_affine(curves, Affine::rotate(degrees.to_radians()));
}

pub fn translate(curves: &mut [RawCurve], offset: Vec2) {
    apply_affine(curves, Affine::translate(offset));
}

/// Scales the curve list uniformly so that it fits in a `width` by `height`
/// box, and moves the minimum corner of its bounding box to the origin.
///
/// The bounding box is taken over all curves together, so their relative
/// placement is kept. One axis fills the box exactly; the other is
/// whatever the aspect ratio gives. Returns the scale factor.
///
/// A bounding box with zero width or zero height is an error, and the
/// curves are left untouched.
pub fn scale_to_box(curves: &mut [RawCurve], width: f64, height: f64) -> Result<f64> {
    let bbox = bounding_box(curves).ok_or(CurveError::EmptyCurveList)?;
    if !(bbox.width() > 0.0 && bbox.height() > 0.0) {
        return Err(CurveError::DegenerateBounds {
            width: bbox.width(),
            height: bbox.height(),
        });
    }
    let scale = (width / bbox.width()).min(height / bbox.height());

    let transform = Affine::translate(-bbox.origin().to_vec2()).then_scale(scale);
    apply_affine(curves, transform);
    Ok(scale)
}

/// Rounds every coordinate to `digits` decimal places.
pub fn round(curves: &mut [RawCurve], digits: u32) {
    let factor = 10f64.powi(digits as i32);
    for p in curves.iter_mut().flat_map(|c| c.points.iter_mut()) {
        p.x = (p.x * factor).round() / factor;
        p.y = (p.y * factor).round() / factor;
    }
}
