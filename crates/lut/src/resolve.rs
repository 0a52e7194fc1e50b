//! Choosing a pose for each point of each curve.

use fivebar_curves::{Curve, RawCurve, ResolvedCurve, ResolvedPoint};
use fivebar_geom::{Config, FromKurbo, LinkagePose, Point};

use crate::kdtree::{Neighbor, SpatialIndex};
use crate::table::{CalibrationTable, SafetyLimits};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolverConfig {
    /// How far (in mm) a table entry's pen tip may be from the target.
    pub tolerance: f64,
    /// If set, only this many of the nearest entries are considered.
    pub max_candidates: Option<usize>,
    /// Re-run forward kinematics on each candidate before accepting it.
    pub verify: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            tolerance: 1.0,
            max_candidates: None,
            verify: true,
        }
    }
}

/// A mechanical check applied to every candidate pose.
pub trait Interference {
    fn allows(&self, pose: &LinkagePose) -> bool;
}

/// Trusts the table, which was already filtered when it was built.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Interference for AcceptAll {
    fn allows(&self, _pose: &LinkagePose) -> bool {
        true
    }
}

impl<F: Fn(&LinkagePose) -> bool> Interference for F {
    fn allows(&self, pose: &LinkagePose) -> bool {
        self(pose)
    }
}

/// Re-checks poses against a set of safety limits, possibly stricter than
/// the ones the table was built with.
#[derive(Clone, Copy, Debug)]
pub struct SafetyCheck {
    pub config: Config,
    pub limits: SafetyLimits,
}

impl Interference for SafetyCheck {
    fn allows(&self, pose: &LinkagePose) -> bool {
        self.config
            .forward(pose)
            .is_ok_and(|tip| self.limits.accepts(&self.config, &tip))
    }
}

/// Looks up poses in a calibration table, preferring poses close to the
/// last one it returned.
///
/// The resolver is stateful: it remembers the previous accepted pose across
/// points and across curves, so a whole drawing should go through one
/// resolver in drawing order.
pub struct Resolver<'a, I, C = AcceptAll> {
    table: &'a CalibrationTable,
    index: I,
    interference: C,
    config: ResolverConfig,
    previous: Option<LinkagePose>,
}

impl<'a, I: SpatialIndex> Resolver<'a, I, AcceptAll> {
    /// `index` must have been built over `table`'s entries, in order.
    pub fn new(table: &'a CalibrationTable, index: I) -> Self {
        Resolver {
            table,
            index,
            interference: AcceptAll,
            config: ResolverConfig::default(),
            previous: None,
        }
    }
}

impl<'a, I: SpatialIndex, C: Interference> Resolver<'a, I, C> {
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_interference<D: Interference>(self, interference: D) -> Resolver<'a, I, D> {
        Resolver {
            table: self.table,
            index: self.index,
            interference,
            config: self.config,
            previous: self.previous,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn previous(&self) -> Option<LinkagePose> {
        self.previous
    }

    /// Forgets the previous pose, so the next point is chosen without
    /// regard to continuity.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    fn acceptable(&self, target: Point, n: &Neighbor) -> bool {
        let pose = &self.table.entries[n.index].pose;
        if !self.interference.allows(pose) {
            return false;
        }
        if self.config.verify {
            let Ok(tip) = self.table.config.pen_tip(pose) else {
                return false;
            };
            if (tip - target).square_length().sqrt() > self.config.tolerance {
                return false;
            }
        }
        true
    }

    fn within_tolerance(&self, target: Point, n: &Neighbor) -> bool {
        let tol = self.config.tolerance;
        (self.table.entries[n.index].tip - target).square_length() <= tol * tol
    }

    /// Finds a pose for a single point, or `None` if nothing in the table
    /// is acceptable. Unreachable points leave the continuity state alone.
    pub fn resolve_point(&mut self, target: Point) -> Option<LinkagePose> {
        let candidates = match self.config.max_candidates {
            // The k nearest that are within tolerance are exactly the first
            // k results of the radius query.
            Some(k) => {
                let mut near = self.index.nearest(target, k);
                near.retain(|n| self.within_tolerance(target, n));
                near
            }
            None => self.index.within(target, self.config.tolerance),
        };

        let prev = self.previous;
        let cost = |pose: &LinkagePose| prev.map_or(0.0, |p| pose.angular_distance(&p));
        // `min_by` keeps the first of equal elements, so ties go to the
        // nearer candidate.
        let best = candidates
            .iter()
            .filter(|n| self.acceptable(target, n))
            .map(|n| self.table.entries[n.index].pose)
            .min_by(|a, b| cost(a).total_cmp(&cost(b)))?;

        self.previous = Some(best);
        Some(best)
    }

    pub fn resolve_curve(&mut self, curve: &RawCurve) -> ResolvedCurve {
        let points = curve
            .points
            .iter()
            .map(|&point| ResolvedPoint {
                point,
                pose: self.resolve_point(Point::from_kurbo(point)),
            })
            .collect();
        Curve::new(curve.id, points)
    }

    /// Resolves every curve in order, sharing continuity between them.
    pub fn resolve_all(&mut self, curves: &[RawCurve]) -> Vec<ResolvedCurve> {
        self.resolve_all_with_progress(curves, |_, _| {})
    }

    /// Like [`Resolver::resolve_all`], but calls `progress(done, total)`
    /// with point counts after each curve.
    pub fn resolve_all_with_progress(
        &mut self,
        curves: &[RawCurve],
        mut progress: impl FnMut(usize, usize),
    ) -> Vec<ResolvedCurve> {
        let total: usize = curves.iter().map(|c| c.points.len()).sum();
        let mut done = 0;
        let resolved: Vec<ResolvedCurve> = curves
            .iter()
            .map(|c| {
                let r = self.resolve_curve(c);
                done += c.points.len();
                progress(done, total);
                r
            })
            .collect();
        let unreachable = resolved
            .iter()
            .flat_map(|c| &c.points)
            .filter(|p| p.pose.is_none())
            .count();
        if unreachable > 0 {
            log::warn!("{unreachable} of {total} points are out of reach and will be skipped");
        } else {
            log::debug!("resolved all {total} points");
        }
        resolved
    }
}
