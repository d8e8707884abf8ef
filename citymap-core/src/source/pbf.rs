use super::{GeometrySource, RawArea, RawBuilding, RawEdge, RawWater, bounds_around};
use crate::types::{GeoBounds, GeoPoint};

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use osmpbf::{Element, ElementReader, RelMemberType};
use tracing::{Level, event};

/// `highway` values that are mapped but do not describe a usable way.
const EXCLUDED_HIGHWAYS: &[&str] = &[
    "abandoned",
    "bus_stop",
    "construction",
    "no",
    "planned",
    "platform",
    "proposed",
    "raceway",
    "razed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WayKind {
    Road,
    Water,
    Building,
}

type Tags<'a> = [(&'a str, &'a str)];

fn find_tag<'a>(tags: &Tags<'a>, key: &str) -> Option<&'a str> {
    tags.iter()
        .find_map(|&(k, v)| if k == key { Some(v) } else { None })
}

fn is_water(tags: &Tags) -> bool {
    matches!(find_tag(tags, "natural"), Some("water"))
        || matches!(find_tag(tags, "waterway"), Some("riverbank"))
        || matches!(find_tag(tags, "landuse"), Some("reservoir" | "basin"))
}

fn is_building(tags: &Tags) -> bool {
    find_tag(tags, "building").is_some_and(|value| value != "no")
}

fn classify_way(tags: &Tags) -> Option<WayKind> {
    if let Some(highway) = find_tag(tags, "highway") {
        let excluded =
            EXCLUDED_HIGHWAYS.contains(&highway) || matches!(find_tag(tags, "area"), Some("yes"));
        return (!excluded).then_some(WayKind::Road);
    }

    if is_water(tags) {
        Some(WayKind::Water)
    } else if is_building(tags) {
        Some(WayKind::Building)
    } else {
        None
    }
}

fn classify_relation(tags: &Tags) -> Option<WayKind> {
    if find_tag(tags, "type") != Some("multipolygon") {
        return None;
    }

    if is_water(tags) {
        Some(WayKind::Water)
    } else if is_building(tags) {
        Some(WayKind::Building)
    } else {
        None
    }
}

struct WayRecord {
    /// Tagged as the queried kind itself, not only referenced by a relation.
    standalone: bool,
    highway: Option<String>,
    footway: Option<String>,
    refs: Vec<i64>,
}

#[derive(Debug, Default)]
struct AreaRelation {
    outer: Vec<i64>,
    inner: Vec<i64>,
}

/// Splits a way into the runs of consecutive nodes that are present in `nodes`.
///
/// A node outside the extract breaks the way; bridging the gap would draw a chord that is not
/// on the map. Runs shorter than two points are dropped.
fn resolve_runs(refs: &[i64], nodes: &HashMap<i64, GeoPoint>) -> Vec<Vec<GeoPoint>> {
    let mut runs = Vec::new();
    let mut run = Vec::new();

    for id in refs {
        match nodes.get(id) {
            Some(point) => run.push(*point),
            None if run.len() >= 2 => runs.push(std::mem::take(&mut run)),
            None => run.clear(),
        }
    }

    if run.len() >= 2 {
        runs.push(run);
    }

    runs
}

fn is_closed(refs: &[i64]) -> bool {
    refs.len() >= 4 && refs.first() == refs.last()
}

/// A closed ring with every node present, or nothing.
fn resolve_ring(refs: &[i64], nodes: &HashMap<i64, GeoPoint>) -> Option<Vec<GeoPoint>> {
    if !is_closed(refs) {
        return None;
    }

    refs.iter().map(|id| nodes.get(id).copied()).collect()
}

/// Joins relation member ways end to end into closed rings.
///
/// Members may be listed in any order and direction. Chains that cannot be closed are dropped.
fn stitch_rings(mut pending: Vec<Vec<i64>>) -> Vec<Vec<i64>> {
    pending.retain(|way| way.len() >= 2);
    pending.reverse();

    let mut rings = Vec::new();

    while let Some(mut current) = pending.pop() {
        loop {
            if current.first() == current.last() {
                if is_closed(&current) {
                    rings.push(current);
                }
                break;
            }

            let Some(&end) = current.last() else {
                break;
            };
            let Some(index) = pending
                .iter()
                .rposition(|way| way.first() == Some(&end) || way.last() == Some(&end))
            else {
                break;
            };

            let mut next = pending.remove(index);
            if next.first() != Some(&end) {
                next.reverse();
            }
            current.extend(next.into_iter().skip(1));
        }
    }

    rings
}

/// Even-odd test on raw degrees, good enough to tell which outer ring holds a hole.
fn ring_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    let mut inside = false;

    for (a, b) in ring.iter().zip(ring.iter().cycle().skip(1)) {
        if (a.lat > point.lat) != (b.lat > point.lat)
            && point.lon < (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon
        {
            inside = !inside;
        }
    }

    inside
}

/// Pairs every inner ring with the first outer ring containing it. Orphan holes are dropped.
fn assemble_areas(outer: Vec<Vec<GeoPoint>>, inner: Vec<Vec<GeoPoint>>) -> Vec<RawArea> {
    let mut areas = outer.into_iter().map(RawArea::new).collect::<Vec<_>>();

    for hole in inner {
        let Some(&sample) = hole.first() else {
            continue;
        };

        if let Some(area) = areas
            .iter_mut()
            .find(|area| ring_contains(&area.exterior, sample))
        {
            area.holes.push(hole);
        }
    }

    areas
}

/// Reads roads, water and buildings from a local `.osm.pbf` extract.
///
/// Each query streams the file once per element type it needs: multipolygon relations, then
/// ways, then the nodes those ways reference. Ways are split where they leave the extract;
/// areas are built from closed ways and from stitched multipolygon relations.
#[derive(Debug, Clone)]
pub struct PbfSource {
    path: PathBuf,
}

impl PbfSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        PbfSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn reader(&self) -> Result<ElementReader<std::io::BufReader<std::fs::File>>> {
        ElementReader::from_path(&self.path).with_context(|| format!("open {}", self.path.display()))
    }

    fn read_relations(&self, kind: WayKind) -> Result<Vec<AreaRelation>> {
        let mut relations = Vec::new();

        self.reader()?
            .for_each(|element| {
                let Element::Relation(relation) = element else {
                    return;
                };
                if classify_relation(&relation.tags().collect::<Vec<_>>()) != Some(kind) {
                    return;
                }

                let mut record = AreaRelation::default();
                for member in relation.members() {
                    if !matches!(member.member_type, RelMemberType::Way) {
                        continue;
                    }
                    match member.role() {
                        Ok("inner") => record.inner.push(member.member_id),
                        _ => record.outer.push(member.member_id),
                    }
                }
                relations.push(record);
            })
            .with_context(|| format!("read relations from {}", self.path.display()))?;

        Ok(relations)
    }

    fn read_ways(&self, kind: WayKind, members: &HashSet<i64>) -> Result<BTreeMap<i64, WayRecord>> {
        let mut ways = BTreeMap::new();

        self.reader()?
            .for_each(|element| {
                let Element::Way(way) = element else {
                    return;
                };

                let tags = way.tags().collect::<Vec<_>>();
                let standalone = classify_way(&tags) == Some(kind);
                if !standalone && !members.contains(&way.id()) {
                    return;
                }

                ways.insert(
                    way.id(),
                    WayRecord {
                        standalone,
                        highway: find_tag(&tags, "highway").map(str::to_string),
                        footway: find_tag(&tags, "footway").map(str::to_string),
                        refs: way.refs().collect(),
                    },
                );
            })
            .with_context(|| format!("read ways from {}", self.path.display()))?;

        Ok(ways)
    }

    fn read_nodes(&self, wanted: &HashSet<i64>) -> Result<HashMap<i64, GeoPoint>> {
        let mut nodes = HashMap::with_capacity(wanted.len());

        self.reader()?
            .for_each(|element| {
                let (id, lat, lon) = match element {
                    Element::Node(node) => (node.id(), node.lat(), node.lon()),
                    Element::DenseNode(node) => (node.id(), node.lat(), node.lon()),
                    _ => return,
                };

                if wanted.contains(&id) {
                    nodes.insert(id, GeoPoint::new(lat, lon));
                }
            })
            .with_context(|| format!("read nodes from {}", self.path.display()))?;

        Ok(nodes)
    }

    fn wanted_nodes<'a>(ways: impl IntoIterator<Item = &'a WayRecord>) -> HashSet<i64> {
        ways.into_iter()
            .flat_map(|way| way.refs.iter().copied())
            .collect()
    }

    fn areas(&self, kind: WayKind, bounds: GeoBounds) -> Result<Vec<RawArea>> {
        let scan_start = std::time::Instant::now();

        let relations = self.read_relations(kind)?;
        let members = relations
            .iter()
            .flat_map(|relation| relation.outer.iter().chain(&relation.inner))
            .copied()
            .collect::<HashSet<_>>();
        let ways = self.read_ways(kind, &members)?;
        let nodes = self.read_nodes(&Self::wanted_nodes(ways.values()))?;

        let mut incomplete = 0_usize;
        let mut areas = Vec::new();

        for way in ways.values().filter(|way| way.standalone) {
            match resolve_ring(&way.refs, &nodes) {
                Some(ring) => areas.push(RawArea::new(ring)),
                None => incomplete += 1,
            }
        }

        let rings = |ids: &[i64]| {
            let parts = ids
                .iter()
                .filter_map(|id| ways.get(id))
                .map(|way| way.refs.clone())
                .collect();

            stitch_rings(parts)
                .iter()
                .filter_map(|ring| resolve_ring(ring, &nodes))
                .collect::<Vec<_>>()
        };

        for relation in &relations {
            let outer = rings(&relation.outer);
            if outer.is_empty() {
                incomplete += 1;
                continue;
            }
            areas.extend(assemble_areas(outer, rings(&relation.inner)));
        }

        areas.retain(|area| area.overlaps(&bounds));

        event!(
            Level::DEBUG,
            "Read {} {:?} areas ({} relations, {} incomplete) from {} in {:.2}ms",
            areas.len(),
            kind,
            relations.len(),
            incomplete,
            self.path.display(),
            crate::millis(scan_start.elapsed())
        );

        Ok(areas)
    }
}

impl GeometrySource for PbfSource {
    fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>> {
        let scan_start = std::time::Instant::now();
        let bounds = bounds_around(center, radius_m);

        let ways = self.read_ways(WayKind::Road, &HashSet::new())?;
        let nodes = self.read_nodes(&Self::wanted_nodes(ways.values()))?;

        let mut split = 0_usize;
        let mut edges = Vec::new();

        for way in ways.into_values() {
            let runs = resolve_runs(&way.refs, &nodes);
            if runs.iter().map(Vec::len).sum::<usize>() != way.refs.len() {
                split += 1;
            }

            for points in runs {
                if points.iter().any(|p| bounds.contains(p)) {
                    edges.push(RawEdge {
                        highway: way.highway.clone(),
                        footway: way.footway.clone(),
                        points,
                    });
                }
            }
        }

        event!(
            Level::DEBUG,
            "Read {} road ways ({} split at missing nodes) from {} in {:.2}ms",
            edges.len(),
            split,
            self.path.display(),
            crate::millis(scan_start.elapsed())
        );

        Ok(edges)
    }

    fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>> {
        self.areas(WayKind::Water, bounds)
    }

    fn buildings(&self, bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
        self.areas(WayKind::Building, bounds)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn nodes(ids: &[i64]) -> HashMap<i64, GeoPoint> {
        ids.iter()
            .map(|&id| (id, GeoPoint::new(id as f64 * 1e-3, 0.0)))
            .collect()
    }

    #[test]
    fn unusable_highways_are_not_roads() {
        for value in ["proposed", "construction", "abandoned", "platform", "raceway", "bus_stop", "razed"] {
            assert_eq!(classify_way(&[("highway", value)]), None, "{}", value);
        }

        assert_eq!(classify_way(&[("highway", "pedestrian"), ("area", "yes")]), None);
        assert_eq!(classify_way(&[("highway", "residential")]), Some(WayKind::Road));
        assert_eq!(
            classify_way(&[("highway", "footway"), ("footway", "sidewalk")]),
            Some(WayKind::Road)
        );
        assert_eq!(classify_way(&[("natural", "water")]), Some(WayKind::Water));
        assert_eq!(classify_way(&[("building", "yes")]), Some(WayKind::Building));
        assert_eq!(classify_way(&[("building", "no")]), None);
    }

    #[test]
    fn ways_are_split_where_nodes_are_missing() {
        let present = nodes(&[1, 2, 3, 5, 6, 8]);

        let runs = resolve_runs(&[1, 2, 3, 4, 5, 6, 7, 8], &present);

        // Node 8 alone cannot form a segment, and no chord joins 3 to 5.
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 3);
        assert_eq!(runs[1], vec![present[&5], present[&6]]);

        assert_eq!(resolve_runs(&[1, 2, 3], &present), vec![vec![present[&1], present[&2], present[&3]]]);
        assert!(resolve_runs(&[4, 7], &present).is_empty());
    }

    #[test]
    fn rings_are_stitched_from_unordered_members() {
        // Square 1-2-3-4 split into three members, one of them reversed.
        let rings = stitch_rings(vec![vec![3, 4, 1], vec![1, 2], vec![3, 2]]);

        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert!(is_closed(ring));
        assert_eq!(ring.len(), 5);
        for id in [1, 2, 3, 4] {
            assert!(ring.contains(&id));
        }

        // A chain with a gap never closes.
        assert!(stitch_rings(vec![vec![1, 2], vec![3, 4]]).is_empty());
        // Closed members pass through untouched.
        assert_eq!(stitch_rings(vec![vec![7, 8, 9, 7]]), vec![vec![7, 8, 9, 7]]);
    }

    #[test]
    fn inner_rings_become_holes_of_the_outer_that_holds_them() {
        let square = |min: f64, max: f64| {
            vec![
                GeoPoint::new(min, min),
                GeoPoint::new(min, max),
                GeoPoint::new(max, max),
                GeoPoint::new(max, min),
                GeoPoint::new(min, min),
            ]
        };

        let areas = assemble_areas(
            vec![square(0.0, 1.0), square(5.0, 6.0)],
            vec![square(5.2, 5.4), square(20.0, 21.0)],
        );

        assert_eq!(areas.len(), 2);
        assert!(areas[0].holes.is_empty());
        assert_eq!(areas[1].holes, vec![square(5.2, 5.4)]);
    }

    #[test]
    fn incomplete_rings_are_not_areas() {
        let present = nodes(&[1, 2, 3]);

        assert!(resolve_ring(&[1, 2, 3, 1], &present).is_some());
        assert!(resolve_ring(&[1, 2, 4, 1], &present).is_none());
        assert!(resolve_ring(&[1, 2, 3], &present).is_none());
    }
}
