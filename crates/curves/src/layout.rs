//! The full 2d preparation pipeline, from extracted curves to millimetre
//! coordinates on the page.

use kurbo::Vec2;

use crate::{reorder, route, simplify, smoother, transform, CurveError, RawCurve, Result};

#[derive(Clone, Debug)]
pub struct Layout {
    /// Roughly how many points each curve is simplified to.
    pub target_points: usize,
    /// Rotation applied before fitting to the page, in degrees.
    pub rotate_deg: f64,
    /// Page size in millimetres.
    pub page_width: f64,
    pub page_height: f64,
    /// Chaikin passes after scaling. Zero disables smoothing.
    pub smoothing: usize,
    /// Where the page's minimum corner ends up, in machine coordinates.
    pub offset: Vec2,
    pub round_digits: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            target_points: 250,
            rotate_deg: 90.0,
            page_width: 100.0,
            page_height: 148.0,
            smoothing: 0,
            offset: Vec2::new(10.0, 5.0),
            round_digits: 3,
        }
    }
}

impl Layout {
    pub fn with_target_points(&mut self, n: usize) -> &mut Self {
        self.target_points = n;
        self
    }

    pub fn with_rotation(&mut self, degrees: f64) -> &mut Self {
        self.rotate_deg = degrees;
        self
    }

    pub fn with_page(&mut self, width: f64, height: f64) -> &mut Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    pub fn with_smoothing(&mut self, iterations: usize) -> &mut Self {
        self.smoothing = iterations;
        self
    }

    pub fn with_offset(&mut self, offset: Vec2) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn with_round_digits(&mut self, digits: u32) -> &mut Self {
        self.round_digits = digits;
        self
    }

    /// Runs simplify and reorder on each curve, orders the curves, then
    /// rotates, fits to the page, smooths, offsets and rounds.
    pub fn prepare(&self, curves: Vec<RawCurve>) -> Result<Vec<RawCurve>> {
        if curves.is_empty() {
            return Err(CurveError::EmptyCurveList);
        }
        let input_points: usize = curves.iter().map(|c| c.points.len()).sum();

        let curves: Vec<RawCurve> = curves
            .into_iter()
            .filter(|c| !c.points.is_empty())
            .map(|mut c| {
                c.points = reorder::reorder(&simplify::simplify(&c.points, self.target_points));
                c
            })
            .collect();

        let before = route::travel_length(&curves);
        let order = route::tsp_order(&curves);
        let mut curves = route::apply_order(curves, &order);
        log::debug!(
            "pen-up travel {before:.1} -> {:.1} over {} curves",
            route::travel_length(&curves),
            curves.len()
        );

        transform::rotate(&mut curves, self.rotate_deg);
        let scale = transform::scale_to_box(&mut curves, self.page_width, self.page_height)?;
        smoother::smooth_all(&mut curves, self.smoothing);
        transform::translate(&mut curves, self.offset);
        transform::round(&mut curves, self.round_digits);

        let output_points: usize = curves.iter().map(|c| c.points.len()).sum();
        log::info!(
            "laid out {} curves, {input_points} -> {output_points} points, scale {scale:.4}",
            curves.len()
        );
        Ok(curves)
    }
}
