//! Basic geometry of the five-bar drawing arm, including forward kinematics
//! from motor angles to the pen tip and conversion between angles and
//! stepper steps.
//!
//! Two motors sit on the x axis at `(-d/2, 0)` and `(d/2, 0)`. Each one turns
//! a "first link"; the two "second links" hang off the first-link tips and
//! meet at the "joint". The pen is mounted on the extension of the right
//! second link, a fixed offset beyond the joint.
//!
//! The left motor angle is mirrored: a zero left angle points the left first
//! link in the -x direction, and positive angles on either side lift the
//! links towards +y. Equal angles therefore give a symmetric pose.
//!
//! This crate supports `no_std` and uses `libm` for its trigonometry.

#![cfg_attr(not(feature = "std"), no_std)]

use core::f64::consts::PI;
use libm::{acos, atan2, cos, fabs, fmod, hypot, round, sin, sqrt};

pub type Angle = euclid::Angle<f64>;
pub type Point = euclid::Point2D<f64, Mm>;
pub type Vector = euclid::Vector2D<f64, Mm>;

pub struct Mm;

pub type Len = euclid::Length<f64, Mm>;

/// Tip positions closer than this are treated as coincident.
const COINCIDENT_EPS: f64 = 1e-8;
/// A joint this close to the right first-link tip leaves the pen direction undefined.
const SINGULAR_EPS: f64 = 1e-6;

fn square(x: f64) -> f64 {
    x * x
}

pub trait LenExt {
    fn mm(self) -> Len;
}

impl LenExt for f64 {
    fn mm(self) -> Len {
        Len::new(self)
    }
}

pub trait FromKurbo {
    type Input;
    fn from_kurbo(p: Self::Input) -> Self;
}

pub trait ToKurbo {
    type Output;
    fn to_kurbo(&self) -> Self::Output;
}

#[cfg(feature = "kurbo")]
impl FromKurbo for Point {
    type Input = kurbo::Point;
    fn from_kurbo(p: kurbo::Point) -> Self {
        Point::new(p.x, p.y)
    }
}

#[cfg(feature = "kurbo")]
impl ToKurbo for Point {
    type Output = kurbo::Point;
    fn to_kurbo(&self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LeftRight<T> {
    pub left: T,
    pub right: T,
}

impl<T> LeftRight<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn map<S>(self, mut f: impl FnMut(T) -> S) -> LeftRight<S> {
        LeftRight {
            left: f(self.left),
            right: f(self.right),
        }
    }
}

/// Angles of the two motor shafts.
///
/// Not every pair is physically realizable; see [`Config::forward`].
pub type LinkagePose = LeftRight<Angle>;

impl LinkagePose {
    pub fn from_degrees(left: f64, right: f64) -> Self {
        LeftRight {
            left: Angle::degrees(left),
            right: Angle::degrees(right),
        }
    }

    /// The L1 distance between two poses, in degrees. Angles are compared
    /// as plain numbers, without wrapping around the circle.
    pub fn angular_distance(&self, other: &LinkagePose) -> f64 {
        fabs(self.left.to_degrees() - other.left.to_degrees())
            + fabs(self.right.to_degrees() - other.right.to_degrees())
    }
}

/// Absolute stepper positions, measured in steps from the zero angle.
pub type MotorSteps = LeftRight<i32>;

/// Why a pose has no pen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Infeasible {
    /// The first-link tips are more than two second-link lengths apart.
    OutOfReach,
    /// The first-link tips coincide, so the joint is not determined.
    CoincidentTips,
    /// The joint lands on the right first-link tip, so the pen direction is undefined.
    Singular,
}

impl core::fmt::Display for Infeasible {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Infeasible::OutOfReach => f.write_str("second links cannot reach each other"),
            Infeasible::CoincidentTips => f.write_str("first-link tips coincide"),
            Infeasible::Singular => f.write_str("pen direction is undefined"),
        }
    }
}

/// Everything forward kinematics knows about a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TipPose {
    pub left_tip: Point,
    pub right_tip: Point,
    pub joint: Point,
    pub pen_tip: Point,
}

pub struct ConfigBuilder {
    first_link: Len,
    second_link: Len,
    motor_distance: Len,
    pen_offset: Len,
    step_angle: Angle,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            first_link: 65.0.mm(),
            second_link: 85.0.mm(),
            motor_distance: 50.0.mm(),
            pen_offset: 25.0.mm(),
            step_angle: Angle::degrees(1.8),
        }
    }
}

impl ConfigBuilder {
    pub fn build(&self) -> Config {
        Config {
            first_link: self.first_link,
            second_link: self.second_link,
            motor_distance: self.motor_distance,
            pen_offset: self.pen_offset,
            step_angle: self.step_angle,
        }
    }

    pub fn with_first_link(&mut self, len: Len) -> &mut Self {
        self.first_link = len;
        self
    }

    pub fn with_second_link(&mut self, len: Len) -> &mut Self {
        self.second_link = len;
        self
    }

    pub fn with_motor_distance(&mut self, d: Len) -> &mut Self {
        self.motor_distance = d;
        self
    }

    pub fn with_pen_offset(&mut self, offset: Len) -> &mut Self {
        self.pen_offset = offset;
        self
    }

    pub fn with_step_angle(&mut self, step: Angle) -> &mut Self {
        self.step_angle = step;
        self
    }
}

/// The geometric configuration of a five-bar arm.
///
/// A calibration table is only valid for the configuration it was built
/// with, so this type is serialized alongside tables.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Length of the links driven directly by the motors.
    pub first_link: Len,
    /// Length of the links joining the first-link tips to the joint.
    pub second_link: Len,
    /// Horizontal distance between the two motor shafts.
    pub motor_distance: Len,
    /// How far beyond the joint the pen sits, along the right second link.
    pub pen_offset: Len,
    /// How far a motor shaft turns in one step.
    pub step_angle: Angle,
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

impl Config {
    pub fn motor_pivots(&self) -> LeftRight<Point> {
        let half = self.motor_distance.get() / 2.0;
        LeftRight {
            left: Point::new(-half, 0.0),
            right: Point::new(half, 0.0),
        }
    }

    /// Where the first links end up for a given pose. This can't fail.
    pub fn first_link_tips(&self, pose: &LinkagePose) -> LeftRight<Point> {
        let pivots = self.motor_pivots();
        let l1 = self.first_link.get();
        let (tl, tr) = (pose.left.get(), pose.right.get());
        LeftRight {
            left: pivots.left + Vector::new(-l1 * cos(tl), l1 * sin(tl)),
            right: pivots.right + Vector::new(l1 * cos(tr), l1 * sin(tr)),
        }
    }

    /// Runs the full forward kinematics for a pose.
    pub fn forward(&self, pose: &LinkagePose) -> Result<TipPose, Infeasible> {
        let tips = self.first_link_tips(pose);
        let joint = second_link_joint(&tips, self.second_link)?;

        let dir = joint - tips.right;
        let norm = hypot(dir.x, dir.y);
        if norm < SINGULAR_EPS {
            return Err(Infeasible::Singular);
        }

        Ok(TipPose {
            left_tip: tips.left,
            right_tip: tips.right,
            joint,
            pen_tip: joint + dir * (self.pen_offset.get() / norm),
        })
    }

    pub fn pen_tip(&self, pose: &LinkagePose) -> Result<Point, Infeasible> {
        self.forward(pose).map(|t| t.pen_tip)
    }

    /// Solves for the poses that put the joint (not the pen) at `joint`.
    ///
    /// Each side has two elbow solutions, so there are four combinations,
    /// returned as `[(l+, r+), (l+, r-), (l-, r+), (l-, r-)]` with angles in
    /// `(-180°, 180°]`. Forward kinematics always picks the upper joint, so
    /// some of these may map back to a different joint. Returns `None` if
    /// either side can't reach.
    pub fn joint_candidates(&self, joint: Point) -> Option<[LinkagePose; 4]> {
        let pivots = self.motor_pivots();
        let (left_a, left_b) = self.elbow_solutions(joint - pivots.left)?;
        let (right_a, right_b) = self.elbow_solutions(joint - pivots.right)?;

        // The left angle is mirrored about the y axis.
        let left = [PI - left_a, PI - left_b].map(|a| normalize_degrees(a.to_degrees()));
        let right = [right_a, right_b].map(|a| normalize_degrees(a.to_degrees()));

        Some([
            LinkagePose::from_degrees(left[0], right[0]),
            LinkagePose::from_degrees(left[0], right[1]),
            LinkagePose::from_degrees(left[1], right[0]),
            LinkagePose::from_degrees(left[1], right[1]),
        ])
    }

    // The two standard-position angles (radians) of a first link whose tip
    // is `l2` away from `rel`, where `rel` is measured from the motor pivot.
    fn elbow_solutions(&self, rel: Vector) -> Option<(f64, f64)> {
        let l1 = self.first_link.get();
        let l2 = self.second_link.get();
        let r = hypot(rel.x, rel.y);
        if r < COINCIDENT_EPS {
            return None;
        }
        let cos_phi = (square(l1) + square(r) - square(l2)) / (2.0 * l1 * r);
        if fabs(cos_phi) > 1.0 + 1e-12 {
            return None;
        }
        let base = atan2(rel.y, rel.x);
        let phi = acos(cos_phi.clamp(-1.0, 1.0));
        Some((base + phi, base - phi))
    }

    /// Quantizes a pose to the nearest whole number of steps on each axis.
    pub fn pose_to_steps(&self, pose: &LinkagePose) -> MotorSteps {
        let step = self.step_angle.to_degrees();
        MotorSteps {
            left: round(pose.left.to_degrees() / step) as i32,
            right: round(pose.right.to_degrees() / step) as i32,
        }
    }

    pub fn steps_to_pose(&self, steps: &MotorSteps) -> LinkagePose {
        let step = self.step_angle.to_degrees();
        LinkagePose::from_degrees(steps.left as f64 * step, steps.right as f64 * step)
    }
}

/// Finds where two second links of length `l2`, hanging off `tips`, meet.
///
/// Of the two circle intersections we always take the upper one (larger y),
/// which is what makes forward kinematics single-valued.
pub fn second_link_joint(tips: &LeftRight<Point>, l2: Len) -> Result<Point, Infeasible> {
    let l2 = l2.get();
    let chord = tips.right - tips.left;
    let d = hypot(chord.x, chord.y);
    if d > 2.0 * l2 {
        return Err(Infeasible::OutOfReach);
    }
    if d < COINCIDENT_EPS {
        return Err(Infeasible::CoincidentTips);
    }

    let a = d / 2.0;
    // Clamp, because at full extension rounding can push this slightly negative.
    let h = sqrt((square(l2) - square(a)).max(0.0));
    let mid = tips.left + chord * 0.5;
    let perp = Vector::new(-chord.y, chord.x) * (h / d);

    let p1 = mid + perp;
    let p2 = mid - perp;
    Ok(if p1.y >= p2.y { p1 } else { p2 })
}

/// Wraps an angle in degrees into `(-180, 180]`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let mut a = fmod(deg, 360.0);
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}
