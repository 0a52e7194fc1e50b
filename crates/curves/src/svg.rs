//! Reading curve lists out of SVG line drawings.

use std::path::Path;

use kurbo::{BezPath, PathEl, Point};
use usvg::{tiny_skia_path::PathSegment, TreeParsing};

use crate::{Curve, CurveError, RawCurve, Result};

/// Loads every path in an SVG and flattens it to curves, one per subpath.
pub fn load_svg(path: &Path, tolerance: f64) -> Result<Vec<RawCurve>> {
    let data = std::fs::read(path)?;
    let bez = parse_svg(&data)?;
    let curves = to_curves(&bez, tolerance);
    log::info!("loaded {} curves from {}", curves.len(), path.display());
    Ok(curves)
}

pub fn parse_svg(data: &[u8]) -> Result<BezPath> {
    // TODO: apparently git master usvg supports text-to-path?
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &opt).map_err(|e| CurveError::Svg(e.to_string()))?;
    let mut ret = BezPath::new();

    let cvt = |pt: usvg::tiny_skia_path::Point| kurbo::Point::new(pt.x as f64, pt.y as f64);

    for node in tree.root.descendants() {
        let mut bez = BezPath::new();
        if let usvg::NodeKind::Path(p) = &*node.borrow() {
            let transform = parent_transform(&node);
            let Some(path) = p.data.as_ref().clone().transform(transform) else {
                log::warn!("dropping a path that can't be transformed");
                continue;
            };
            for seg in path.segments() {
                match seg {
                    PathSegment::MoveTo(pt) => bez.move_to(cvt(pt)),
                    PathSegment::LineTo(pt) => bez.line_to(cvt(pt)),
                    PathSegment::QuadTo(pt1, pt2) => bez.quad_to(cvt(pt1), cvt(pt2)),
                    PathSegment::CubicTo(pt1, pt2, pt3) => {
                        bez.curve_to(cvt(pt1), cvt(pt2), cvt(pt3))
                    }
                    PathSegment::Close => bez.close_path(),
                }
            }
        }
        ret.extend(bez);
    }
    Ok(ret)
}

fn parent_transform(node: &usvg::Node) -> usvg::Transform {
    let Some(parent) = node.parent() else {
        return usvg::Transform::identity();
    };
    let transform = match &*parent.borrow() {
        usvg::NodeKind::Group(g) => g.abs_transform,
        _ => {
            log::warn!("expected a path to have a group as its parent");
            usvg::Transform::identity()
        }
    };
    transform
}

/// Flattens a path to polylines, starting a new curve at every move-to.
///
/// Closed subpaths repeat their first point at the end. Curve ids count up
/// from 1 in document order.
pub fn to_curves(path: &BezPath, tolerance: f64) -> Vec<RawCurve> {
    let mut polylines: Vec<Vec<Point>> = Vec::new();
    let mut cur: Vec<Point> = Vec::new();
    path.flatten(tolerance, |el| match el {
        PathEl::MoveTo(p) => {
            if !cur.is_empty() {
                polylines.push(std::mem::take(&mut cur));
            }
            cur.push(p);
        }
        PathEl::LineTo(p) => cur.push(p),
        PathEl::ClosePath => {
            if let Some(start) = cur.first().copied() {
                cur.push(start);
                polylines.push(std::mem::take(&mut cur));
            }
        }
        // Flattening only produces lines.
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    if !cur.is_empty() {
        polylines.push(cur);
    }

    polylines
        .into_iter()
        .enumerate()
        .map(|(i, points)| Curve::new(i as u32 + 1, points))
        .collect()
}
