use crate::{
    constants::{EPS_ANG, SNAP_SCALE},
    types::{Point, Rect},
};

use std::collections::{BTreeMap, BTreeSet};

type GridKey = (i64, i64);

// Crossings closer than half a snapping step to an endpoint collapse onto it.
const SPLIT_TOLERANCE_M: f64 = 0.5 / SNAP_SCALE;

fn snap_key(point: &Point) -> GridKey {
    (
        (point.x * SNAP_SCALE).round() as i64,
        (point.y * SNAP_SCALE).round() as i64,
    )
}

fn from_key(key: &GridKey) -> Point {
    Point::new(key.0 as f64 / SNAP_SCALE, key.1 as f64 / SNAP_SCALE)
}

fn cross(a: &Point, b: &Point) -> f64 {
    a.x * b.y - a.y * b.x
}

fn sub(a: &Point, b: &Point) -> Point {
    Point::new(a.x - b.x, a.y - b.y)
}

fn dot(a: &Point, b: &Point) -> f64 {
    a.x * b.x + a.y * b.y
}

/// A planar graph: every crossing between input segments is a shared vertex.
///
/// Vertices sit on the snapping grid and are numbered in coordinate order, edges are undirected
/// and sorted, so two arrangements built from the same segment set are identical.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arrangement {
    pub vertices: Vec<Point>,
    pub edges: Vec<(usize, usize)>,
}

/// Uniform grid over segment bounding boxes.
struct GridIndex {
    origin: Point,
    cell: f64,
    cells: BTreeMap<GridKey, Vec<usize>>,
    ranges: Vec<(GridKey, GridKey)>,
}

impl GridIndex {
    fn build(segments: &[(Point, Point)]) -> Self {
        let points = segments
            .iter()
            .flat_map(|(a, b)| [*a, *b])
            .collect::<Vec<_>>();
        let bounds = Rect::bounding(&points).unwrap_or(Rect {
            min: Point::ZERO,
            max: Point::ZERO,
        });

        let count = segments.len().max(1) as f64;
        let cell = ((bounds.width().max(1.0) * bounds.height().max(1.0)) / count)
            .sqrt()
            .max(1.0);

        let mut index = GridIndex {
            origin: bounds.min,
            cell,
            cells: BTreeMap::new(),
            ranges: Vec::with_capacity(segments.len()),
        };

        for (id, (a, b)) in segments.iter().enumerate() {
            // Padded so that near-touching segments always share a cell.
            let lo = index.cell_of(&Point::new(
                a.x.min(b.x) - SPLIT_TOLERANCE_M,
                a.y.min(b.y) - SPLIT_TOLERANCE_M,
            ));
            let hi = index.cell_of(&Point::new(
                a.x.max(b.x) + SPLIT_TOLERANCE_M,
                a.y.max(b.y) + SPLIT_TOLERANCE_M,
            ));

            for cx in lo.0..=hi.0 {
                for cy in lo.1..=hi.1 {
                    index.cells.entry((cx, cy)).or_default().push(id);
                }
            }
            index.ranges.push((lo, hi));
        }

        index
    }

    fn cell_of(&self, point: &Point) -> GridKey {
        (
            ((point.x - self.origin.x) / self.cell).floor() as i64,
            ((point.y - self.origin.y) / self.cell).floor() as i64,
        )
    }

    /// Every pair of segments sharing a cell, reported once.
    fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();

        for (key, members) in &self.cells {
            for (pos, &i) in members.iter().enumerate() {
                for &j in &members[pos + 1..] {
                    let (lo_i, _) = self.ranges[i];
                    let (lo_j, _) = self.ranges[j];

                    // Only the first shared cell reports the pair.
                    if (lo_i.0.max(lo_j.0), lo_i.1.max(lo_j.1)) == *key {
                        pairs.push((i, j));
                    }
                }
            }
        }

        pairs
    }
}

fn boxes_overlap(s: &(Point, Point), o: &(Point, Point)) -> bool {
    let tol = SPLIT_TOLERANCE_M;

    s.0.x.min(s.1.x) <= o.0.x.max(o.1.x) + tol
        && o.0.x.min(o.1.x) <= s.0.x.max(s.1.x) + tol
        && s.0.y.min(s.1.y) <= o.0.y.max(o.1.y) + tol
        && o.0.y.min(o.1.y) <= s.0.y.max(s.1.y) + tol
}

type Splits = Vec<Vec<(f64, Point)>>;

// Parameter of `point` projected on `start -> start + dir`, if it falls strictly inside.
fn interior_param(point: &Point, start: &Point, dir: &Point, len: f64) -> Option<f64> {
    let t = dot(&sub(point, start), dir) / (len * len);
    let tol = SPLIT_TOLERANCE_M / len;

    (t > tol && t < 1.0 - tol).then_some(t)
}

fn record_crossings(segments: &[(Point, Point)], i: usize, j: usize, splits: &mut Splits) {
    let s = &segments[i];
    let o = &segments[j];

    if !boxes_overlap(s, o) {
        return;
    }

    let (a, b) = s;
    let (c, d) = o;
    let r = sub(b, a);
    let q = sub(d, c);
    let len_r = dot(&r, &r).sqrt();
    let len_q = dot(&q, &q).sqrt();
    let ac = sub(c, a);
    let denom = cross(&r, &q);

    if denom.abs() <= EPS_ANG * len_r * len_q {
        // Parallel: only collinear overlaps matter.
        if cross(&r, &ac).abs() / len_r > SPLIT_TOLERANCE_M {
            return;
        }

        for point in [c, d] {
            if let Some(t) = interior_param(point, a, &r, len_r) {
                splits[i].push((t, *point));
            }
        }
        for point in [a, b] {
            if let Some(u) = interior_param(point, c, &q, len_q) {
                splits[j].push((u, *point));
            }
        }
        return;
    }

    let t = cross(&ac, &q) / denom;
    let u = cross(&ac, &r) / denom;

    let tol_t = SPLIT_TOLERANCE_M / len_r;
    let tol_u = SPLIT_TOLERANCE_M / len_q;

    if t < -tol_t || t > 1.0 + tol_t || u < -tol_u || u > 1.0 + tol_u {
        return;
    }

    // A crossing at an existing endpoint reuses that endpoint exactly.
    let point = if u <= tol_u {
        *c
    } else if u >= 1.0 - tol_u {
        *d
    } else if t <= tol_t {
        *a
    } else if t >= 1.0 - tol_t {
        *b
    } else {
        Point::new(a.x + t * r.x, a.y + t * r.y)
    };

    if t > tol_t && t < 1.0 - tol_t {
        splits[i].push((t, point));
    }
    if u > tol_u && u < 1.0 - tol_u {
        splits[j].push((u, point));
    }
}

/// Nodes `segments` into a planar [Arrangement].
///
/// Endpoints are snapped to the grid first, then every segment is split at its crossings with
/// the others (candidates come from a uniform grid), and the pieces are snapped again.
pub(crate) fn node_segments(segments: &[(Point, Point)]) -> Arrangement {
    let snapped = segments
        .iter()
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .filter_map(|(a, b)| {
            let (ka, kb) = (snap_key(a), snap_key(b));
            match ka.cmp(&kb) {
                std::cmp::Ordering::Less => Some((ka, kb)),
                std::cmp::Ordering::Greater => Some((kb, ka)),
                std::cmp::Ordering::Equal => None,
            }
        })
        .collect::<BTreeSet<_>>();

    let keyed = snapped.into_iter().collect::<Vec<_>>();
    let segments = keyed
        .iter()
        .map(|(a, b)| (from_key(a), from_key(b)))
        .collect::<Vec<_>>();

    let index = GridIndex::build(&segments);
    let mut splits: Splits = vec![Vec::new(); segments.len()];

    for (i, j) in index.candidate_pairs() {
        record_crossings(&segments, i, j, &mut splits);
    }

    let mut edges = BTreeSet::new();

    for ((ka, kb), mut cuts) in keyed.into_iter().zip(splits) {
        cuts.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut keys = Vec::with_capacity(cuts.len() + 2);
        keys.push(ka);
        keys.extend(cuts.iter().map(|(_, point)| snap_key(point)));
        keys.push(kb);
        keys.dedup();

        for pair in keys.windows(2) {
            let (u, v) = (pair[0], pair[1]);
            if u != v {
                edges.insert(if u < v { (u, v) } else { (v, u) });
            }
        }
    }

    let ids = edges
        .iter()
        .flat_map(|(u, v)| [*u, *v])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(id, key)| (key, id))
        .collect::<BTreeMap<_, _>>();

    Arrangement {
        vertices: ids.keys().map(from_key).collect(),
        edges: edges.iter().map(|(u, v)| (ids[u], ids[v])).collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn seg(ax: f64, ay: f64, bx: f64, by: f64) -> (Point, Point) {
        (Point::new(ax, ay), Point::new(bx, by))
    }

    #[test]
    fn crossing_segments_share_a_vertex() {
        let arrangement = node_segments(&[seg(-1.0, 0.0, 1.0, 0.0), seg(0.0, -1.0, 0.0, 1.0)]);

        assert_eq!(arrangement.vertices.len(), 5);
        assert_eq!(arrangement.edges.len(), 4);
        assert!(arrangement.vertices.contains(&Point::ZERO));
    }

    #[test]
    fn t_junctions_split_the_through_segment() {
        let arrangement = node_segments(&[seg(0.0, 0.0, 10.0, 0.0), seg(4.0, 0.0, 4.0, 5.0)]);

        assert_eq!(arrangement.vertices.len(), 4);
        assert_eq!(arrangement.edges.len(), 3);
    }

    #[test]
    fn collinear_overlaps_are_merged() {
        let arrangement = node_segments(&[
            seg(0.0, 0.0, 10.0, 0.0),
            seg(5.0, 0.0, 15.0, 0.0),
            seg(10.0, 0.0, 0.0, 0.0),
        ]);

        // 0 -- 5 -- 10 -- 15
        assert_eq!(arrangement.vertices.len(), 4);
        assert_eq!(arrangement.edges.len(), 3);
    }

    #[test]
    fn output_does_not_depend_on_input_order() {
        let mut segments = vec![
            seg(-3.0, -3.0, 3.0, 3.0),
            seg(-3.0, 3.0, 3.0, -3.0),
            seg(-3.0, 0.5, 3.0, 0.5),
            seg(0.25, -3.0, 0.25, 3.0),
        ];

        let forward = node_segments(&segments);
        segments.reverse();
        let backward = node_segments(&segments);

        assert_eq!(forward, backward);
    }

    #[test]
    fn vertices_are_snapped_to_centimeters() {
        let arrangement = node_segments(&[seg(0.001, 0.0, 1.004, 0.0)]);

        assert_eq!(arrangement.vertices, vec![Point::ZERO, Point::new(1.0, 0.0)]);
    }
}
