use crate::{
    constants::EARTH_RADIUS_M,
    types::{GeoPoint, Point},
};

/// Equirectangular projection tangent at the frame center.
///
/// Distances are exact along the central meridian and parallel, which is plenty for frames of a
/// few tens of kilometers. x grows to the east, y to the north.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalProjection {
    center: GeoPoint,
    cos_lat: f64,
}

impl LocalProjection {
    pub fn new(center: GeoPoint) -> Self {
        LocalProjection {
            center,
            cos_lat: center.lat.to_radians().cos(),
        }
    }

    pub fn project(&self, point: &GeoPoint) -> Point {
        let d_lon = (point.lon - self.center.lon).to_radians();
        let d_lat = (point.lat - self.center.lat).to_radians();

        Point::new(
            EARTH_RADIUS_M * d_lon * self.cos_lat,
            EARTH_RADIUS_M * d_lat,
        )
    }

    pub fn project_all(&self, points: &[GeoPoint]) -> Vec<Point> {
        points.iter().map(|point| self.project(point)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn center_maps_to_origin() {
        let projection = LocalProjection::new(GeoPoint::new(47.4979, 19.0402));
        let origin = projection.project(&GeoPoint::new(47.4979, 19.0402));

        assert_eq!(origin, Point::ZERO);
    }

    #[test]
    fn axes_are_in_meters() {
        let projection = LocalProjection::new(GeoPoint::new(60.0, 10.0));

        // One degree of latitude is about 111.2 km everywhere.
        let north = projection.project(&GeoPoint::new(61.0, 10.0));
        assert!((north.y - 111_195.0).abs() < 10.0);
        assert!(north.x.abs() < 1e-9);

        // One degree of longitude shrinks with cos(latitude).
        let east = projection.project(&GeoPoint::new(60.0, 11.0));
        assert!((east.x - 111_195.0 * 0.5).abs() < 10.0);
    }
}
