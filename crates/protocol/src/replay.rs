//! Running step commands back through forward kinematics, to see what the
//! plotter will actually draw.

use fivebar_curves::{Curve, RawCurve};
use fivebar_geom::{Config, ToKurbo};

use crate::StepCommand;

/// Turns step commands into the pen-down strokes they trace out.
///
/// Each run of commands with the same curve id becomes one stroke. Commands
/// whose pose has no pen position are dropped with a warning.
pub fn replay(cmds: &[StepCommand], config: &Config) -> Vec<RawCurve> {
    let mut strokes: Vec<RawCurve> = Vec::new();
    let mut infeasible = 0;
    for cmd in cmds {
        let pose = config.steps_to_pose(&cmd.steps);
        let Ok(tip) = config.pen_tip(&pose) else {
            infeasible += 1;
            continue;
        };
        let p = tip.to_kurbo();
        match strokes.last_mut() {
            Some(s) if s.id == cmd.curve_id => s.points.push(p),
            _ => strokes.push(Curve::new(cmd.curve_id, vec![p])),
        }
    }
    if infeasible > 0 {
        log::warn!("{infeasible} step commands have no pen position");
    }
    strokes
}

#[cfg(test)]
mod tests {
    use super::*;
    use fivebar_geom::LinkagePose;

    #[test]
    fn strokes_follow_curve_ids() {
        let config = Config::default();
        let cmds = vec![
            StepCommand::new(1, 22, 33),
            StepCommand::new(1, 23, 33),
            // Both arms pointing straight out: out of reach.
            StepCommand::new(1, 0, 0),
            StepCommand::new(2, 25, 35),
            StepCommand::new(1, 22, 33),
        ];
        let strokes = replay(&cmds, &config);
        let ids: Vec<_> = strokes.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 1]);
        assert_eq!(strokes[0].points.len(), 2);

        let expected = config
            .pen_tip(&LinkagePose::from_degrees(22.0 * 1.8, 33.0 * 1.8))
            .unwrap();
        assert!((strokes[0].points[0].x - expected.x).abs() < 1e-9);
        assert!((strokes[0].points[0].y - expected.y).abs() < 1e-9);
        assert_eq!(strokes[2].points, vec![strokes[0].points[0]]);
    }
}
