//! Building the calibration table: forward kinematics over the whole angle
//! grid, minus the poses that put the arm somewhere it shouldn't be.

use fivebar_geom::{Config, LinkagePose, Point, TipPose};
use serde::{Deserialize, Serialize};

use crate::kdtree::KdTree;

/// The discretized range swept for both motors, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleGrid {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for AngleGrid {
    fn default() -> Self {
        AngleGrid {
            min: -180.0,
            max: 180.0,
            step: 1.8,
        }
    }
}

impl AngleGrid {
    /// The grid values, inclusive of both ends when the step divides the range.
    ///
    /// Each value is computed from its index rather than by accumulation, so
    /// the last value doesn't drift.
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.max < self.min {
            return Vec::new();
        }
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1;
        (0..count).map(|i| self.min + i as f64 * self.step).collect()
    }
}

/// Geometric rules for poses that are reachable but unsafe to draw with.
///
/// All distances are in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafetyLimits {
    /// The joint must sit strictly between the two first-link tips, at least
    /// this far from each horizontally. Otherwise the linkage has folded over.
    pub joint_margin: f64,
    /// If both first-link tips are below this height, they risk hitting each other.
    pub min_tip_height: f64,
    /// How far a first-link tip may cross past the opposite motor when it is
    /// below `crossing_height`.
    pub crossing_margin: f64,
    /// A first-link tip below this height must not cross more than
    /// `crossing_margin` past the opposite motor.
    pub crossing_height: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        SafetyLimits {
            joint_margin: 1.0,
            min_tip_height: 20.0,
            crossing_margin: 10.0,
            crossing_height: -10.0,
        }
    }
}

impl SafetyLimits {
    pub fn accepts(&self, config: &Config, tip: &TipPose) -> bool {
        let pivots = config.motor_pivots();
        let (l, r, joint) = (tip.left_tip, tip.right_tip, tip.joint);

        if !(l.x + self.joint_margin < joint.x && joint.x < r.x - self.joint_margin) {
            return false;
        }
        if l.y < self.min_tip_height && r.y < self.min_tip_height {
            return false;
        }
        if l.x > pivots.right.x + self.crossing_margin && l.y < self.crossing_height {
            return false;
        }
        if r.x < pivots.left.x - self.crossing_margin && r.y < self.crossing_height {
            return false;
        }
        true
    }
}

/// One safe pose and where it puts the pen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub pose: LinkagePose,
    pub tip: Point,
}

/// Every safe pose on the grid, for one particular mechanism.
///
/// Nothing mutates a table once it is built, so it can be shared freely
/// between resolvers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub config: Config,
    pub entries: Vec<TableEntry>,
}

impl CalibrationTable {
    pub fn build(config: &Config, grid: &AngleGrid, limits: &SafetyLimits) -> Self {
        Self::build_with_progress(config, grid, limits, |_, _| {})
    }

    /// Like [`CalibrationTable::build`], but calls `progress(done, total)`
    /// after each left-motor angle has been swept.
    pub fn build_with_progress(
        config: &Config,
        grid: &AngleGrid,
        limits: &SafetyLimits,
        mut progress: impl FnMut(usize, usize),
    ) -> Self {
        let angles = grid.values();
        let mut entries = Vec::new();
        let mut infeasible = 0usize;
        let mut unsafe_poses = 0usize;

        for (row, &left) in angles.iter().enumerate() {
            for &right in &angles {
                let pose = LinkagePose::from_degrees(left, right);
                match config.forward(&pose) {
                    Ok(tip) if limits.accepts(config, &tip) => entries.push(TableEntry {
                        pose,
                        tip: tip.pen_tip,
                    }),
                    Ok(_) => unsafe_poses += 1,
                    Err(_) => infeasible += 1,
                }
            }
            progress(row + 1, angles.len());
        }

        let total = angles.len() * angles.len();
        log::info!(
            "swept {total} poses: {} safe, {infeasible} infeasible, {unsafe_poses} unsafe",
            entries.len()
        );
        CalibrationTable {
            config: *config,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A table together with a spatial index over its pen tips.
///
/// This is what gets persisted as the binary index file, so that loading
/// doesn't need to rebuild the tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedTable {
    pub table: CalibrationTable,
    pub tree: KdTree,
}

impl IndexedTable {
    pub fn new(table: CalibrationTable) -> Self {
        let tree = KdTree::build(table.entries.iter().map(|e| e.tip));
        IndexedTable { table, tree }
    }
}
