//! Nearest-neighbor search over the pen tips of a calibration table.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fivebar_geom::Point;
use serde::{Deserialize, Serialize};

use crate::table::TableEntry;

/// A search result: which table entry, and how far its tip is from the query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Anything that can find table entries near a point.
///
/// Results are always sorted by distance, with ties broken by table index,
/// so that two implementations over the same table agree exactly.
pub trait SpatialIndex {
    /// All entries within `radius` (inclusive) of `p`.
    fn within(&self, p: Point, radius: f64) -> Vec<Neighbor>;

    /// The `k` entries closest to `p`, or fewer if the table is smaller.
    fn nearest(&self, p: Point, k: usize) -> Vec<Neighbor>;
}

impl<T: SpatialIndex + ?Sized> SpatialIndex for &T {
    fn within(&self, p: Point, radius: f64) -> Vec<Neighbor> {
        (**self).within(p, radius)
    }

    fn nearest(&self, p: Point, k: usize) -> Vec<Neighbor> {
        (**self).nearest(p, k)
    }
}

fn dist2(p: Point, x: f64, y: f64) -> f64 {
    let dx = p.x - x;
    let dy = p.y - y;
    dx * dx + dy * dy
}

// (squared distance, index), ordered so that a max-heap pops the worst one.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate(f64, usize);

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

impl Candidate {
    fn neighbor(self) -> Neighbor {
        Neighbor {
            index: self.1,
            distance: self.0.sqrt(),
        }
    }
}

fn into_sorted(mut found: Vec<Candidate>) -> Vec<Neighbor> {
    found.sort_unstable();
    found.into_iter().map(Candidate::neighbor).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct KdNode {
    x: f64,
    y: f64,
    index: u32,
}

impl KdNode {
    fn coord(&self, axis: usize) -> f64 {
        if axis == 0 {
            self.x
        } else {
            self.y
        }
    }
}

/// A 2d tree stored as a flat array.
///
/// Each subslice is a subtree whose root sits at its midpoint; the elements
/// before it are no larger along the splitting axis and the elements after
/// it are no smaller. Axes alternate between x and y with depth.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KdTree {
    nodes: Vec<KdNode>,
}

impl KdTree {
    /// Builds a tree over `points`, remembering each point's position in the iterator.
    pub fn build(points: impl IntoIterator<Item = Point>) -> Self {
        let mut nodes: Vec<KdNode> = points
            .into_iter()
            .enumerate()
            .map(|(index, p)| KdNode {
                x: p.x,
                y: p.y,
                index: index as u32,
            })
            .collect();
        build_rec(&mut nodes, 0);
        KdTree { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn build_rec(nodes: &mut [KdNode], axis: usize) {
    if nodes.len() <= 1 {
        return;
    }
    let mid = nodes.len() / 2;
    nodes.select_nth_unstable_by(mid, |a, b| a.coord(axis).total_cmp(&b.coord(axis)));
    let (left, rest) = nodes.split_at_mut(mid);
    build_rec(left, 1 - axis);
    build_rec(&mut rest[1..], 1 - axis);
}

fn within_rec(nodes: &[KdNode], axis: usize, p: Point, r: f64, out: &mut Vec<Candidate>) {
    if nodes.is_empty() {
        return;
    }
    let mid = nodes.len() / 2;
    let node = &nodes[mid];
    let d2 = dist2(p, node.x, node.y);
    if d2 <= r * r {
        out.push(Candidate(d2, node.index as usize));
    }

    let diff = [p.x, p.y][axis] - node.coord(axis);
    if diff <= r {
        within_rec(&nodes[..mid], 1 - axis, p, r, out);
    }
    if diff >= -r {
        within_rec(&nodes[mid + 1..], 1 - axis, p, r, out);
    }
}

fn nearest_rec(nodes: &[KdNode], axis: usize, p: Point, k: usize, heap: &mut BinaryHeap<Candidate>) {
    if nodes.is_empty() {
        return;
    }
    let mid = nodes.len() / 2;
    let node = &nodes[mid];
    heap.push(Candidate(dist2(p, node.x, node.y), node.index as usize));
    if heap.len() > k {
        heap.pop();
    }

    let diff = [p.x, p.y][axis] - node.coord(axis);
    let (near, far) = if diff <= 0.0 {
        (&nodes[..mid], &nodes[mid + 1..])
    } else {
        (&nodes[mid + 1..], &nodes[..mid])
    };
    nearest_rec(near, 1 - axis, p, k, heap);
    // `<=` rather than `<`: an equally distant point with a smaller index
    // might still be on the far side.
    let worst = heap.peek().map_or(f64::INFINITY, |c| c.0);
    if heap.len() < k || diff * diff <= worst {
        nearest_rec(far, 1 - axis, p, k, heap);
    }
}

impl SpatialIndex for KdTree {
    fn within(&self, p: Point, radius: f64) -> Vec<Neighbor> {
        let mut found = Vec::new();
        within_rec(&self.nodes, 0, p, radius, &mut found);
        into_sorted(found)
    }

    fn nearest(&self, p: Point, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        nearest_rec(&self.nodes, 0, p, k, &mut heap);
        into_sorted(heap.into_vec())
    }
}

/// Brute-force search. Slow, but obviously correct.
#[derive(Clone, Copy, Debug)]
pub struct LinearScan<'a> {
    pub entries: &'a [TableEntry],
}

impl<'a> LinearScan<'a> {
    pub fn new(entries: &'a [TableEntry]) -> Self {
        LinearScan { entries }
    }

    fn all(&self, p: Point) -> impl Iterator<Item = Candidate> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, e)| Candidate(dist2(p, e.tip.x, e.tip.y), i))
    }
}

impl SpatialIndex for LinearScan<'_> {
    fn within(&self, p: Point, radius: f64) -> Vec<Neighbor> {
        into_sorted(self.all(p).filter(|c| c.0 <= radius * radius).collect())
    }

    fn nearest(&self, p: Point, k: usize) -> Vec<Neighbor> {
        let mut found = into_sorted(self.all(p).collect());
        found.truncate(k);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fivebar_geom::LinkagePose;
    use proptest::prelude::*;

    fn entries(points: &[(f64, f64)]) -> Vec<TableEntry> {
        points
            .iter()
            .map(|&(x, y)| TableEntry {
                pose: LinkagePose::from_degrees(0.0, 0.0),
                tip: Point::new(x, y),
            })
            .collect()
    }

    #[test]
    fn small_tree() {
        let es = entries(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (3.0, 4.0), (-1.0, -1.0)]);
        let tree = KdTree::build(es.iter().map(|e| e.tip));
        assert_eq!(tree.len(), 5);

        let near = tree.within(Point::new(0.0, 0.0), 5.0);
        let indices: Vec<_> = near.iter().map(|n| n.index).collect();
        // (3, 4) is exactly on the boundary, which counts.
        assert_eq!(indices, vec![0, 4, 3]);
        assert_eq!(near[2].distance, 5.0);

        let two = tree.nearest(Point::new(9.0, 1.0), 2);
        assert_eq!(two[0].index, 1);
        assert_eq!(two[1].index, 3);
    }

    #[test]
    fn ties_go_to_lower_index() {
        // Four points at the same distance from the origin.
        let es = entries(&[(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)]);
        let tree = KdTree::build(es.iter().map(|e| e.tip));
        let found: Vec<_> = tree
            .nearest(Point::new(0.0, 0.0), 2)
            .iter()
            .map(|n| n.index)
            .collect();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn empty() {
        let tree = KdTree::build(std::iter::empty());
        assert!(tree.is_empty());
        assert!(tree.within(Point::new(0.0, 0.0), 100.0).is_empty());
        assert!(tree.nearest(Point::new(0.0, 0.0), 3).is_empty());
    }

    fn points() -> impl Strategy<Value = Vec<(f64, f64)>> {
        // Coarse coordinates, so that there are plenty of exact ties.
        prop::collection::vec(((-20i32..20), (-20i32..20)), 0..200).prop_map(|v| {
            v.into_iter()
                .map(|(x, y)| (x as f64 * 0.5, y as f64 * 0.5))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn tree_agrees_with_scan(
            pts in points(),
            qx in -12.0..12.0f64,
            qy in -12.0..12.0f64,
            r in 0.0..6.0f64,
            k in 0usize..20,
        ) {
            let es = entries(&pts);
            let tree = KdTree::build(es.iter().map(|e| e.tip));
            let scan = LinearScan::new(&es);
            let q = Point::new(qx, qy);

            prop_assert_eq!(tree.within(q, r), scan.within(q, r));
            prop_assert_eq!(tree.nearest(q, k), scan.nearest(q, k));
        }
    }
}
