/*!
   Module `source` specifies how the core reads raw road, water and building geometry.

   Retrieval itself is not the core's business: the pipeline only talks to the [GeometrySource]
   trait, and every failure it reports is turned into a [NoDataError](crate::NoDataError) by the
   geometry processor. No retries are attempted here.
*/

mod cache;
#[cfg(feature = "osm-pbf")]
mod pbf;

pub use cache::{CachedSource, DEFAULT_CACHE_ENTRIES};
#[cfg(feature = "osm-pbf")]
pub use pbf::PbfSource;

use crate::{
    constants::EARTH_RADIUS_M,
    types::{GeoBounds, GeoPoint},
};

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

/// One way of the road graph, still in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEdge {
    /// Value of the `highway` tag, if any.
    pub highway: Option<String>,
    /// Value of the `footway` tag, if any (`sidewalk` marks a pavement).
    pub footway: Option<String>,
    pub points: Vec<GeoPoint>,
}

impl RawEdge {
    pub fn new(highway: &str, points: Vec<GeoPoint>) -> Self {
        RawEdge {
            highway: Some(highway.to_string()),
            footway: None,
            points,
        }
    }
}

/// An area outline with optional holes, still in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawArea {
    pub exterior: Vec<GeoPoint>,
    pub holes: Vec<Vec<GeoPoint>>,
}

/// A lake, river or basin.
pub type RawWater = RawArea;

/// A building footprint.
pub type RawBuilding = RawArea;

impl RawArea {
    pub fn new(exterior: Vec<GeoPoint>) -> Self {
        RawArea {
            exterior,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(mut self, holes: Vec<Vec<GeoPoint>>) -> Self {
        self.holes = holes;
        self
    }

    fn overlaps(&self, bounds: &GeoBounds) -> bool {
        self.bounds().is_some_and(|b| {
            !(b.lat_max < bounds.lat_min
                || bounds.lat_max < b.lat_min
                || b.lon_max < bounds.lon_min
                || bounds.lon_max < b.lon_min)
        })
    }

    fn bounds(&self) -> Option<GeoBounds> {
        let first = self.exterior.first()?;
        let mut bounds = GeoBounds {
            lat_min: first.lat,
            lon_min: first.lon,
            lat_max: first.lat,
            lon_max: first.lon,
        };

        for point in self.exterior.iter().skip(1) {
            bounds.lat_min = bounds.lat_min.min(point.lat);
            bounds.lon_min = bounds.lon_min.min(point.lon);
            bounds.lat_max = bounds.lat_max.max(point.lat);
            bounds.lon_max = bounds.lon_max.max(point.lon);
        }

        Some(bounds)
    }
}

/// `GeometrySource` supplies the raw data a render needs.
///
/// Implementations must be safe to share between concurrent, independent render invocations.
pub trait GeometrySource {
    /// Every road or path way with at least one node within `radius_m` of `center`.
    fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>>;

    /// Every water area intersecting `bounds`.
    fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>>;

    /// Every building footprint intersecting `bounds`. Sources without building data have none.
    fn buildings(&self, _bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
        Ok(Vec::new())
    }
}

impl<S: GeometrySource + ?Sized> GeometrySource for &S {
    fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>> {
        (**self).road_graph(center, radius_m)
    }

    fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>> {
        (**self).water(bounds)
    }

    fn buildings(&self, bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
        (**self).buildings(bounds)
    }
}

impl<S: GeometrySource + ?Sized> GeometrySource for Arc<S> {
    fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>> {
        (**self).road_graph(center, radius_m)
    }

    fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>> {
        (**self).water(bounds)
    }

    fn buildings(&self, bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
        (**self).buildings(bounds)
    }
}

/// Degree box enclosing the circle of `radius_m` around `center`.
pub fn bounds_around(center: GeoPoint, radius_m: f64) -> GeoBounds {
    let lat_pad = (radius_m / EARTH_RADIUS_M).to_degrees();
    let lon_pad = lat_pad / center.lat.to_radians().cos().max(1e-6);

    GeoBounds {
        lat_min: (center.lat - lat_pad).max(-90.0),
        lon_min: (center.lon - lon_pad).max(-180.0),
        lat_max: (center.lat + lat_pad).min(90.0),
        lon_max: (center.lon + lon_pad).min(180.0),
    }
}

/// An in-memory source, mostly used by tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    edges: Vec<RawEdge>,
    water: Vec<RawWater>,
    buildings: Vec<RawBuilding>,
}

impl MemorySource {
    pub fn new(edges: Vec<RawEdge>, water: Vec<RawWater>) -> Self {
        MemorySource {
            edges,
            water,
            buildings: Vec::new(),
        }
    }

    pub fn with_buildings(mut self, buildings: Vec<RawBuilding>) -> Self {
        self.buildings = buildings;
        self
    }
}

impl GeometrySource for MemorySource {
    fn road_graph(&self, center: GeoPoint, radius_m: f64) -> Result<Vec<RawEdge>> {
        let bounds = bounds_around(center, radius_m);

        Ok(self
            .edges
            .iter()
            .filter(|edge| edge.points.iter().any(|p| bounds.contains(p)))
            .cloned()
            .collect())
    }

    fn water(&self, bounds: GeoBounds) -> Result<Vec<RawWater>> {
        Ok(self
            .water
            .iter()
            .filter(|water| water.overlaps(&bounds))
            .cloned()
            .collect())
    }

    fn buildings(&self, bounds: GeoBounds) -> Result<Vec<RawBuilding>> {
        Ok(self
            .buildings
            .iter()
            .filter(|building| building.overlaps(&bounds))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bounds_around_widens_longitude_with_latitude() {
        let equator = bounds_around(GeoPoint::new(0.0, 0.0), 1000.0);
        let north = bounds_around(GeoPoint::new(60.0, 0.0), 1000.0);

        let equator_lon = equator.lon_max - equator.lon_min;
        let north_lon = north.lon_max - north.lon_min;

        assert!((north_lon / equator_lon - 2.0).abs() < 1e-3);
        assert!(((equator.lat_max - equator.lat_min) - (north.lat_max - north.lat_min)).abs() < 1e-12);
    }

    #[test]
    fn memory_source_filters_by_query() {
        let near = RawEdge::new(
            "residential",
            vec![GeoPoint::new(47.0, 19.0), GeoPoint::new(47.001, 19.0)],
        );
        let far = RawEdge::new(
            "residential",
            vec![GeoPoint::new(48.0, 19.0), GeoPoint::new(48.001, 19.0)],
        );
        let lake = RawWater::new(vec![
            GeoPoint::new(47.0, 19.0),
            GeoPoint::new(47.0, 19.01),
            GeoPoint::new(47.01, 19.01),
        ]);
        let source = MemorySource::new(vec![near.clone(), far], vec![lake]);

        let edges = source.road_graph(GeoPoint::new(47.0, 19.0), 500.0).unwrap();
        assert_eq!(edges, vec![near]);

        let water = source.water(bounds_around(GeoPoint::new(47.0, 19.0), 500.0)).unwrap();
        assert_eq!(water.len(), 1);

        let water = source.water(bounds_around(GeoPoint::new(10.0, 10.0), 500.0)).unwrap();
        assert!(water.is_empty());

        assert!(source.buildings(bounds_around(GeoPoint::new(47.0, 19.0), 500.0)).unwrap().is_empty());
    }
}
