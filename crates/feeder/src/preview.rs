//! Rendering replayed strokes to an SVG, for eyeballing a plot before
//! sending it to the machine.

use std::path::Path;

use fivebar_curves::{bounding_box, RawCurve};
use fivebar_geom::Config;
use svg::{
    node::element::{path::Data, Circle, Path as SvgPath},
    Document,
};

// Multiply all dimensions by 10 because browsers don't like to see small svgs.
const SCALE: f64 = 10.0;

/// Draws each stroke as a polyline, plus dots for the motor pivots.
///
/// The machine's y axis points up, so we flip it to get the picture the
/// right way up.
pub fn document(strokes: &[RawCurve], config: &Config) -> Document {
    let pivots = config.motor_pivots();
    let mut bbox = kurbo::Rect::new(pivots.left.x, 0.0, pivots.right.x, 0.0);
    if let Some(b) = bounding_box(strokes) {
        bbox = bbox.union(b);
    }
    let bbox = bbox.inflate(5.0, 5.0);
    let flip = |x: f64, y: f64| (x * SCALE, -y * SCALE);

    let mut document = Document::new().set(
        "viewBox",
        (
            bbox.x0 * SCALE,
            -bbox.y1 * SCALE,
            bbox.width() * SCALE,
            bbox.height() * SCALE,
        ),
    );

    for stroke in strokes {
        let Some((first, rest)) = stroke.points.split_first() else {
            continue;
        };
        let mut data = Data::new().move_to(flip(first.x, first.y));
        for p in rest {
            data = data.line_to(flip(p.x, p.y));
        }
        let path = SvgPath::new()
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 2)
            .set("d", data);
        document = document.add(path);
    }

    for pivot in [pivots.left, pivots.right] {
        let (cx, cy) = flip(pivot.x, pivot.y);
        document = document.add(
            Circle::new()
                .set("cx", cx)
                .set("cy", cy)
                .set("r", 8.0)
                .set("fill", "blue"),
        );
    }
    document
}

pub fn save(path: &Path, strokes: &[RawCurve], config: &Config) -> anyhow::Result<()> {
    svg::save(path, &document(strokes, config))?;
    log::info!("wrote preview of {} strokes to {}", strokes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fivebar_curves::Curve;
    use kurbo::Point;

    #[test]
    fn one_path_per_stroke() {
        let strokes = vec![
            Curve::new(1, vec![Point::new(0.0, 100.0), Point::new(10.0, 110.0)]),
            Curve::new(2, vec![]),
            Curve::new(3, vec![Point::new(-20.0, 90.0)]),
        ];
        let text = document(&strokes, &Config::default()).to_string();
        assert_eq!(text.matches("<path").count(), 2);
        assert_eq!(text.matches("<circle").count(), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.svg");
        save(&path, &strokes, &Config::default()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
