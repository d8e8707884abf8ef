use crate::{
    constants::{MIN_BUILDING_AREA_M2, MIN_RING_AREA_M2, SNAP_SCALE},
    error::{GeometryRepairFailure, NoDataError},
    source::{GeometrySource, RawArea, bounds_around},
    types::{
        BuildingFootprint, CityBlock, ClassifiedEdge, GeoPoint, Point, Polygon, ProductSpec, Rect,
        Ring, WaterPolygon, fnv1a, signed_area,
    },
};

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{Level, event};

mod classify;
mod clip;
mod planarize;
mod polygonize;
mod projection;
mod repair;

use projection::LocalProjection;
use repair::{canonical_start, orient, repair_ring};

/// Everything the renderer needs, in the projected frame (meters, origin at the center).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedGeometry {
    pub center: GeoPoint,
    pub frame: Rect,
    /// Edges handed to the renderer.
    pub edges: Vec<ClassifiedEdge>,
    /// Non-vehicular edges kept out of `edges`. Empty when they were included.
    pub excluded_non_vehicular: Vec<ClassifiedEdge>,
    pub blocks: Vec<CityBlock>,
    pub water: Vec<WaterPolygon>,
    /// Footprints outside water. Empty when buildings were not requested.
    pub buildings: Vec<BuildingFootprint>,
    pub warnings: Vec<GeometryRepairFailure>,
}

/// Which optional parts [extract] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep footways, cycleways and paths among the drawn edges.
    pub include_non_vehicular: bool,
    /// Query and build building footprints.
    pub buildings: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            include_non_vehicular: false,
            buildings: true,
        }
    }
}

fn cmp_paths(a: &[Point], b: &[Point]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(p, q)| p.total_cmp(q))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn vertex_mean(ring: &[Point]) -> Point {
    let count = ring.len().max(1) as f64;
    let (sx, sy) = ring
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / count, sy / count)
}

fn normalize(mut polygon: Polygon) -> Polygon {
    orient(&mut polygon.exterior, true);
    canonical_start(&mut polygon.exterior);

    for hole in polygon.holes.iter_mut() {
        orient(hole, false);
        canonical_start(hole);
    }
    polygon.holes.sort_by(|a, b| cmp_paths(a, b));

    polygon
}

/// Projects, repairs and clips one raw area. `None` when it lies outside the frame.
fn build_area(
    raw: &RawArea,
    kind: &'static str,
    projection: &LocalProjection,
    frame: &Rect,
) -> Option<Result<Polygon, GeometryRepairFailure>> {
    let exterior = projection.project_all(&raw.exterior);
    let failure = |reason: String| GeometryRepairFailure {
        kind,
        near: vertex_mean(&exterior),
        reason,
    };

    let exterior_ring = match repair_ring(&exterior) {
        Ok(ring) => ring,
        Err(reason) => return Some(Err(failure(reason))),
    };

    let clipped = clip::clip_ring(&exterior_ring, frame);
    if clipped.is_empty() {
        return None;
    }

    let exterior_ring = match repair_ring(&clipped) {
        Ok(ring) => ring,
        Err(reason) => return Some(Err(failure(reason))),
    };

    let holes = raw
        .holes
        .iter()
        .filter_map(|hole| {
            let hole = repair_ring(&projection.project_all(hole)).ok()?;
            repair_ring(&clip::clip_ring(&hole, frame)).ok()
        })
        .collect();

    Some(Ok(normalize(Polygon::new(exterior_ring, holes))))
}

fn in_water(point: &Point, water: &[WaterPolygon]) -> bool {
    water.iter().any(|w| {
        w.polygon.bounds().is_some_and(|b| b.contains(point)) && w.polygon.contains(point)
    })
}

enum BuildingOutcome {
    Kept(BuildingFootprint),
    Small,
    Flooded,
}

fn classify_building(polygon: Polygon, water: &[WaterPolygon]) -> BuildingOutcome {
    if polygon.area() < MIN_BUILDING_AREA_M2 {
        return BuildingOutcome::Small;
    }

    match polygon.interior_point() {
        Some(point) if !in_water(&point, water) => {
            BuildingOutcome::Kept(BuildingFootprint { polygon })
        }
        _ => BuildingOutcome::Flooded,
    }
}

enum FaceOutcome {
    Block(Polygon),
    Water,
    Sliver,
    Dropped(GeometryRepairFailure),
}

fn classify_face(face: Polygon, water: &[WaterPolygon]) -> FaceOutcome {
    if signed_area(&face.exterior).abs() < MIN_RING_AREA_M2 {
        return FaceOutcome::Sliver;
    }

    let near = vertex_mean(&face.exterior);
    let dropped = |reason: String| {
        FaceOutcome::Dropped(GeometryRepairFailure {
            kind: "block",
            near,
            reason,
        })
    };

    let exterior = match repair_ring(&face.exterior) {
        Ok(ring) => ring,
        Err(reason) => return dropped(reason),
    };
    let holes = face
        .holes
        .iter()
        .filter_map(|hole| repair_ring(hole).ok())
        .collect::<Vec<Ring>>();

    let polygon = Polygon::new(exterior, holes);
    if polygon.area() < MIN_RING_AREA_M2 {
        return FaceOutcome::Sliver;
    }

    let Some(inside) = polygon.interior_point() else {
        return dropped("no interior point".to_string());
    };

    if in_water(&inside, water) {
        FaceOutcome::Water
    } else {
        FaceOutcome::Block(normalize(polygon))
    }
}

fn identity_key(polygon: &Polygon) -> (i64, i64) {
    let centroid = polygon.centroid();
    (
        (centroid.x * SNAP_SCALE).round() as i64,
        (centroid.y * SNAP_SCALE).round() as i64,
    )
}

/// Turns the raw road graph, water and buildings around `center` into classified edges, city
/// blocks, water polygons and building footprints clipped to the frame of `spec`.
///
/// The result only depends on the set of raw ways, never on the order the source returns
/// them in.
pub fn extract<S: GeometrySource + ?Sized>(
    center: GeoPoint,
    spec: &ProductSpec,
    options: ExtractOptions,
    source: &S,
) -> Result<ExtractedGeometry, NoDataError> {
    if !center.is_valid() {
        return Err(NoDataError::InvalidCenter(center));
    }

    let (half_w, half_h) = spec.frame_half_sizes_m();
    let frame = Rect::centered(Point::ZERO, half_w, half_h);
    let radius = spec.fetch_radius_m();

    let fetch_start = std::time::Instant::now();

    let raw_edges = source
        .road_graph(center, radius)
        .map_err(|source| NoDataError::SourceFailed { center, source })?;
    let raw_water = source
        .water(bounds_around(center, radius))
        .map_err(|source| NoDataError::SourceFailed { center, source })?;
    let raw_buildings = if options.buildings {
        source
            .buildings(bounds_around(center, radius))
            .map_err(|source| NoDataError::SourceFailed { center, source })?
    } else {
        Vec::new()
    };

    let fetch_time = std::time::Instant::now();
    event!(
        Level::DEBUG,
        "Fetched {} ways, {} water areas and {} buildings within {:.0}m in {:.2}ms",
        raw_edges.len(),
        raw_water.len(),
        raw_buildings.len(),
        radius,
        crate::millis(fetch_time.duration_since(fetch_start))
    );

    let projection = LocalProjection::new(center);

    let mut classified = raw_edges
        .par_iter()
        .flat_map_iter(|edge| {
            let road_class = classify::classify(edge);
            let points = projection.project_all(&edge.points);

            clip::clip_polyline(&points, &frame)
                .into_iter()
                .map(move |geometry| ClassifiedEdge {
                    geometry,
                    road_class,
                })
        })
        .collect::<Vec<_>>();

    classified.sort_by(|a, b| {
        a.road_class
            .draw_priority()
            .cmp(&b.road_class.draw_priority())
            .then_with(|| cmp_paths(&a.geometry, &b.geometry))
    });
    classified.dedup();

    let (edges, excluded_non_vehicular) = if options.include_non_vehicular {
        (classified, Vec::new())
    } else {
        classified
            .into_iter()
            .partition::<Vec<_>, _>(|edge| edge.road_class.is_vehicular())
    };

    if edges.is_empty() {
        return Err(NoDataError::EmptyExtent {
            center,
            width_m: frame.width(),
            height_m: frame.height(),
        });
    }

    let mut warnings = Vec::new();
    let mut water = Vec::new();

    for outcome in raw_water
        .iter()
        .filter_map(|raw| build_area(raw, "water", &projection, &frame))
    {
        match outcome {
            Ok(polygon) => water.push(WaterPolygon { polygon }),
            Err(failure) => warnings.push(failure),
        }
    }
    water.sort_by(|a, b| cmp_paths(&a.polygon.exterior, &b.polygon.exterior));
    water.dedup();

    let building_outcomes = raw_buildings
        .par_iter()
        .filter_map(|raw| build_area(raw, "building", &projection, &frame))
        .map(|outcome| outcome.map(|polygon| classify_building(polygon, &water)))
        .collect::<Vec<_>>();

    let (mut small, mut flooded) = (0_usize, 0_usize);
    let mut buildings = Vec::new();

    for outcome in building_outcomes {
        match outcome {
            Ok(BuildingOutcome::Kept(building)) => buildings.push(building),
            Ok(BuildingOutcome::Small) => small += 1,
            Ok(BuildingOutcome::Flooded) => flooded += 1,
            Err(failure) => warnings.push(failure),
        }
    }
    buildings.sort_by(|a, b| cmp_paths(&a.polygon.exterior, &b.polygon.exterior));
    buildings.dedup();

    let clip_time = std::time::Instant::now();
    event!(
        Level::DEBUG,
        "Clipped {} edges ({} excluded), {} water polygons and {} buildings ({} small, {} in water) in {:.2}ms",
        edges.len(),
        excluded_non_vehicular.len(),
        water.len(),
        buildings.len(),
        small,
        flooded,
        crate::millis(clip_time.duration_since(fetch_time))
    );

    let mut segments = edges
        .iter()
        .flat_map(|edge| edge.geometry.windows(2).map(|w| (w[0], w[1])))
        .collect::<Vec<_>>();

    let corners = frame.corners();
    segments.extend((0..4).map(|i| (corners[i], corners[(i + 1) % 4])));

    for polygon in water.iter().map(|w| &w.polygon) {
        for ring in polygon.rings() {
            segments.extend((0..ring.len()).map(|i| (ring[i], ring[(i + 1) % ring.len()])));
        }
    }

    let arrangement = planarize::node_segments(&segments);
    let faces = polygonize::polygonize(&arrangement);

    let polygonize_time = std::time::Instant::now();
    event!(
        Level::DEBUG,
        "Polygonized {} segments into {} faces in {:.2}ms",
        segments.len(),
        faces.len(),
        crate::millis(polygonize_time.duration_since(clip_time))
    );

    let outcomes = faces
        .into_par_iter()
        .map(|face| classify_face(face, &water))
        .collect::<Vec<_>>();

    let (mut water_faces, mut slivers) = (0_usize, 0_usize);
    let mut polygons = Vec::new();

    for outcome in outcomes {
        match outcome {
            FaceOutcome::Block(polygon) => polygons.push(polygon),
            FaceOutcome::Water => water_faces += 1,
            FaceOutcome::Sliver => slivers += 1,
            FaceOutcome::Dropped(failure) => warnings.push(failure),
        }
    }

    let mut keyed = polygons
        .into_iter()
        .map(|polygon| (identity_key(&polygon), polygon))
        .collect::<Vec<_>>();
    keyed.sort_by(|(ka, a), (kb, b)| {
        ka.cmp(kb)
            .then_with(|| a.area().total_cmp(&b.area()))
            .then_with(|| cmp_paths(&a.exterior, &b.exterior))
    });

    let blocks = keyed
        .into_iter()
        .map(|((kx, ky), polygon)| {
            let area_key = polygon.area().round() as u64;
            CityBlock {
                color_index: fnv1a(&[kx as u64, ky as u64, area_key]),
                polygon,
            }
        })
        .collect::<Vec<_>>();

    for warning in &warnings {
        event!(Level::WARN, "{}", warning);
    }

    event!(
        Level::DEBUG,
        "Built {} blocks ({} water faces, {} slivers, {} dropped) in {:.2}ms",
        blocks.len(),
        water_faces,
        slivers,
        warnings.len(),
        crate::millis(polygonize_time.elapsed())
    );

    Ok(ExtractedGeometry {
        center,
        frame,
        edges,
        excluded_non_vehicular,
        blocks,
        water,
        buildings,
        warnings,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        source::{MemorySource, RawEdge, RawWater},
        types::RoadClass,
    };

    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    const CENTER: GeoPoint = GeoPoint::new(47.4979, 19.0402);

    // Meters to degrees around CENTER, precise enough for fixtures.
    fn geo(x: f64, y: f64) -> GeoPoint {
        let lat = CENTER.lat + (y / crate::constants::EARTH_RADIUS_M).to_degrees();
        let lon = CENTER.lon
            + (x / (crate::constants::EARTH_RADIUS_M * CENTER.lat.to_radians().cos()))
                .to_degrees();
        GeoPoint::new(lat, lon)
    }

    fn way(tag: &str, points: &[(f64, f64)]) -> RawEdge {
        RawEdge::new(tag, points.iter().map(|(x, y)| geo(*x, *y)).collect())
    }

    // Streets every 100 m, reaching well past a 100 m half-height frame, plus a footway across
    // the middle block.
    fn grid_edges() -> Vec<RawEdge> {
        let mut edges = Vec::new();
        for i in -2..=2 {
            let offset = i as f64 * 100.0 - 50.0;
            let tag = if i == 0 { "primary" } else { "residential" };
            edges.push(way(tag, &[(-300.0, offset), (300.0, offset)]));
            edges.push(way("residential", &[(offset, -300.0), (offset, 300.0)]));
        }
        edges.push(way("footway", &[(-50.0, 0.0), (50.0, 0.0)]));
        edges
    }

    fn spec() -> ProductSpec {
        ProductSpec::new(40.0, 40.0, 100.0, 72)
    }

    fn with_paths() -> ExtractOptions {
        ExtractOptions {
            include_non_vehicular: true,
            ..ExtractOptions::default()
        }
    }

    fn footprint(min: (f64, f64), max: (f64, f64)) -> RawArea {
        RawArea::new(vec![
            geo(min.0, min.1),
            geo(max.0, min.1),
            geo(max.0, max.1),
            geo(min.0, max.1),
        ])
    }

    fn total_area(geometry: &ExtractedGeometry) -> f64 {
        geometry.blocks.iter().map(|b| b.polygon.area()).sum::<f64>()
            + geometry.water.iter().map(|w| w.polygon.area()).sum::<f64>()
    }

    #[test]
    fn blocks_tile_the_frame() {
        let source = MemorySource::new(grid_edges(), vec![]);
        let geometry = extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap();

        // Streets at -50 and 50 cut the 200 x 200 frame into 3 x 3 blocks.
        assert_eq!(geometry.blocks.len(), 9);
        assert!((total_area(&geometry) - 200.0 * 200.0).abs() < 1.0);
        assert!(geometry.warnings.is_empty());

        for block in &geometry.blocks {
            assert!(signed_area(&block.polygon.exterior) > 0.0);
            for point in &block.polygon.exterior {
                assert!(geometry.frame.contains(point));
            }
        }
    }

    #[test]
    fn non_vehicular_edges_are_excluded_unless_requested() {
        let source = MemorySource::new(grid_edges(), vec![]);

        let excluded = extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap();
        assert!(excluded.edges.iter().all(|e| e.road_class.is_vehicular()));
        assert_eq!(excluded.excluded_non_vehicular.len(), 1);
        assert_eq!(
            excluded.excluded_non_vehicular[0].road_class,
            RoadClass::NonVehicular
        );

        let included = extract(CENTER, &spec(), with_paths(), &source).unwrap();
        assert!(included.excluded_non_vehicular.is_empty());
        assert!(
            included
                .edges
                .iter()
                .any(|e| e.road_class == RoadClass::NonVehicular)
        );
        // The footway splits the middle block in two.
        assert_eq!(included.blocks.len(), 10);
    }

    #[test]
    fn shuffled_input_gives_identical_output() {
        let edges = grid_edges();
        let forward = MemorySource::new(edges.clone(), vec![]);

        let mut shuffled = edges;
        shuffled.reverse();
        shuffled.rotate_left(3);
        let shuffled = MemorySource::new(shuffled, vec![]);

        let a = extract(CENTER, &spec(), ExtractOptions::default(), &forward).unwrap();
        let b = extract(CENTER, &spec(), ExtractOptions::default(), &shuffled).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn water_takes_precedence_over_blocks() {
        // A lake swallowing the center block and the one east of it, and cutting strips off
        // their neighbours.
        let lake = RawWater::new(vec![
            geo(-60.0, -60.0),
            geo(100.0, -60.0),
            geo(100.0, 60.0),
            geo(-60.0, 60.0),
        ]);
        let source = MemorySource::new(grid_edges(), vec![lake]);
        let geometry = extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap();

        assert_eq!(geometry.water.len(), 1);
        assert!((total_area(&geometry) - 200.0 * 200.0).abs() < 1.0);

        for block in &geometry.blocks {
            let sample = block.polygon.interior_point().unwrap();
            assert!(!geometry.water[0].polygon.contains(&sample));
        }

        // The center block is gone, not left behind as a degenerate shape.
        assert!(
            geometry
                .blocks
                .iter()
                .all(|b| !b.polygon.contains(&Point::ZERO))
        );
        assert!(geometry.blocks.iter().all(|b| b.polygon.area() >= MIN_RING_AREA_M2));
    }

    #[test]
    fn buildings_are_clipped_and_kept_out_of_water() {
        let lake = footprint((-60.0, -60.0), (100.0, 60.0));
        let buildings = vec![
            footprint((-90.0, 70.0), (-70.0, 90.0)),
            // Straddles the east edge of the frame.
            footprint((90.0, 70.0), (110.0, 80.0)),
            // A shed.
            footprint((-90.0, -90.0), (-87.0, -87.0)),
            // A boathouse in the lake.
            footprint((0.0, 0.0), (10.0, 10.0)),
            footprint((500.0, 500.0), (520.0, 520.0)),
        ];
        let source = MemorySource::new(grid_edges(), vec![lake]).with_buildings(buildings);

        let geometry = extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap();

        let mut areas = geometry
            .buildings
            .iter()
            .map(|b| b.polygon.area())
            .collect::<Vec<_>>();
        areas.sort_by(f64::total_cmp);

        assert_eq!(areas.len(), 2);
        assert!((areas[0] - 100.0).abs() < 0.5);
        assert!((areas[1] - 400.0).abs() < 0.5);
        assert!(geometry.warnings.is_empty());
        for building in &geometry.buildings {
            assert!(building.polygon.exterior.iter().all(|p| geometry.frame.contains(p)));
        }

        let without = ExtractOptions {
            buildings: false,
            ..ExtractOptions::default()
        };
        let geometry = extract(CENTER, &spec(), without, &source).unwrap();
        assert!(geometry.buildings.is_empty());
        // Buildings never cut blocks.
        assert_eq!(
            geometry.blocks,
            extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap().blocks
        );
    }

    #[test]
    fn broken_water_is_dropped_with_a_warning() {
        let puddle = RawWater::new(vec![geo(10.0, 10.0), geo(20.0, 10.0), geo(30.0, 10.0)]);
        let source = MemorySource::new(grid_edges(), vec![puddle]);
        let geometry = extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap();

        assert!(geometry.water.is_empty());
        assert_eq!(geometry.warnings.len(), 1);
        assert_eq!(geometry.warnings[0].kind, "water");
        assert_eq!(geometry.blocks.len(), 9);
    }

    #[test]
    fn nested_blocks_get_their_own_color_index() {
        // A closed ring road around the center: the inner block and the frame block around it
        // share a centroid.
        let ring = way(
            "residential",
            &[(-40.0, -40.0), (40.0, -40.0), (40.0, 40.0), (-40.0, 40.0), (-40.0, -40.0)],
        );
        let source = MemorySource::new(vec![ring], vec![]);
        let geometry = extract(CENTER, &spec(), ExtractOptions::default(), &source).unwrap();

        assert_eq!(geometry.blocks.len(), 2);
        let (inner, outer) = (&geometry.blocks[0], &geometry.blocks[1]);
        assert!((inner.polygon.area() - 80.0 * 80.0).abs() < 1.0);
        assert_eq!(outer.polygon.holes.len(), 1);
        assert_ne!(inner.color_index, outer.color_index);
    }

    #[test]
    fn empty_extent_is_no_data() {
        let far_away = way("residential", &[(5000.0, 0.0), (6000.0, 0.0)]);
        let source = MemorySource::new(vec![far_away], vec![]);

        assert!(matches!(
            extract(CENTER, &spec(), ExtractOptions::default(), &source),
            Err(NoDataError::EmptyExtent { .. })
        ));
    }

    struct BrokenSource(AtomicUsize);

    impl GeometrySource for BrokenSource {
        fn road_graph(&self, _: GeoPoint, _: f64) -> Result<Vec<RawEdge>> {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            Err(anyhow::anyhow!("overpass timed out"))
        }

        fn water(&self, _: crate::types::GeoBounds) -> Result<Vec<RawWater>> {
            Ok(vec![])
        }
    }

    #[test]
    fn source_failures_and_bad_centers_are_no_data() {
        let source = BrokenSource(AtomicUsize::new(0));

        assert!(matches!(
            extract(CENTER, &spec(), ExtractOptions::default(), &source),
            Err(NoDataError::SourceFailed { .. })
        ));
        assert!(matches!(
            extract(GeoPoint::new(91.0, 0.0), &spec(), ExtractOptions::default(), &source),
            Err(NoDataError::InvalidCenter(_))
        ));
        assert_eq!(source.0.load(AtomicOrdering::SeqCst), 1);
    }
}
