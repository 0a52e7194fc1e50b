//! What the motor controller gets: absolute step positions, tagged with the
//! curve they belong to.
//!
//! A change of curve id between consecutive commands means the pen lifts.

use fivebar_curves::{CurveId, ResolvedCurve};
use fivebar_geom::{Config, MotorSteps};
use serde::{Deserialize, Serialize};

pub mod csv;
pub mod export;
pub mod replay;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCommand {
    pub curve_id: CurveId,
    pub steps: MotorSteps,
}

impl StepCommand {
    pub fn new(curve_id: CurveId, left: i32, right: i32) -> Self {
        StepCommand {
            curve_id,
            steps: MotorSteps::new(left, right),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("expected header {expected:?}, found {found:?}")]
    Header { expected: String, found: String },
    #[error("csv: {0}")]
    Csv(#[from] ::csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StepError>;

/// Quantizes every resolved pose to motor steps.
///
/// Unreachable points are skipped. Within a curve, a point that quantizes
/// to the same steps as the last command emitted for that curve is dropped,
/// since the motors wouldn't move.
pub fn discretize(curves: &[ResolvedCurve], config: &Config) -> Vec<StepCommand> {
    let mut out = Vec::new();
    let mut skipped = 0;
    let mut duplicates = 0;
    for c in curves {
        let mut last: Option<MotorSteps> = None;
        for p in &c.points {
            let Some(pose) = p.pose else {
                skipped += 1;
                continue;
            };
            let steps = config.pose_to_steps(&pose);
            if last == Some(steps) {
                duplicates += 1;
                continue;
            }
            last = Some(steps);
            out.push(StepCommand {
                curve_id: c.id,
                steps,
            });
        }
    }
    log::debug!(
        "{} step commands ({skipped} unreachable points, {duplicates} repeats dropped)",
        out.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fivebar_curves::{Curve, ResolvedPoint};
    use fivebar_geom::LinkagePose;
    use kurbo::Point;
    use proptest::prelude::*;

    fn pt(pose: Option<(f64, f64)>) -> ResolvedPoint {
        ResolvedPoint {
            point: Point::ZERO,
            pose: pose.map(|(l, r)| LinkagePose::from_degrees(l, r)),
        }
    }

    #[test]
    fn quantizes_and_dedups() {
        let curves = vec![
            Curve::new(
                1,
                vec![
                    pt(Some((40.0, -60.0))),
                    // Rounds to the same steps as the first point.
                    pt(Some((40.3, -60.2))),
                    pt(None),
                    pt(Some((41.4, -60.0))),
                ],
            ),
            // Same steps as the end of the previous curve, but on a new curve.
            Curve::new(3, vec![pt(Some((41.4, -60.0))), pt(None)]),
            Curve::new(4, vec![pt(None)]),
        ];
        let cmds = discretize(&curves, &Config::default());
        assert_eq!(
            cmds,
            vec![
                StepCommand::new(1, 22, -33),
                StepCommand::new(1, 23, -33),
                StepCommand::new(3, 23, -33),
            ]
        );
    }

    #[test]
    fn dedup_skips_over_unreachable() {
        // The unreachable point in between doesn't break up the duplicates.
        let curves = vec![Curve::new(
            2,
            vec![pt(Some((0.0, 0.0))), pt(None), pt(Some((0.1, 0.1)))],
        )];
        let cmds = discretize(&curves, &Config::default());
        assert_eq!(cmds, vec![StepCommand::new(2, 0, 0)]);
    }

    #[test]
    fn no_consecutive_repeats() {
        let curves = vec![Curve::new(
            1,
            (0..100)
                .map(|i| pt(Some((i as f64 * 0.25, -(i as f64) * 0.75))))
                .collect(),
        )];
        let cmds = discretize(&curves, &Config::default());
        assert!(cmds.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(cmds.first().map(|c| c.steps), Some(MotorSteps::new(0, 0)));
        // 24.75 and -74.25 degrees.
        assert_eq!(cmds.last().map(|c| c.steps), Some(MotorSteps::new(14, -41)));
    }

    // Angles on a quarter-step grid, so that neighbours often share steps.
    fn curves() -> impl Strategy<Value = Vec<ResolvedCurve>> {
        let pose = prop::option::weighted(0.8, (-80..80i32, -80..80i32));
        prop::collection::vec(prop::collection::vec(pose, 0..30), 0..6).prop_map(|cs| {
            cs.into_iter()
                .enumerate()
                .map(|(i, poses)| {
                    let points = poses
                        .into_iter()
                        .map(|p| pt(p.map(|(l, r)| (l as f64 * 0.45, r as f64 * 0.45))))
                        .collect();
                    Curve::new(i as u32 + 1, points)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn every_pose_is_emitted_or_merged(curves in curves()) {
            let config = Config::default();
            let cmds = discretize(&curves, &config);
            prop_assert!(cmds
                .windows(2)
                .all(|w| w[0].curve_id != w[1].curve_id || w[0].steps != w[1].steps));

            for c in &curves {
                let mut expected: Vec<MotorSteps> = c
                    .points
                    .iter()
                    .filter_map(|p| p.pose)
                    .map(|pose| config.pose_to_steps(&pose))
                    .collect();
                expected.dedup();
                let emitted: Vec<MotorSteps> = cmds
                    .iter()
                    .filter(|cmd| cmd.curve_id == c.id)
                    .map(|cmd| cmd.steps)
                    .collect();
                prop_assert_eq!(emitted, expected);
            }
        }
    }
}
