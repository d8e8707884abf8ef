use crate::constants::{CM_PER_INCH, EPS_DENOM, FNV_OFFSET, FNV_PRIME, POINTS_PER_INCH};

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use serde::Serialize;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A lat/lon bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl GeoBounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lon >= self.lon_min
            && point.lon <= self.lon_max
    }
}

/// A point in the projected planar frame, in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point::new(0.0, 0.0);

    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    // Total order used wherever output ordering must not depend on input order.
    pub fn total_cmp(&self, other: &Point) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in the projected frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn centered(center: Point, half_width: f64, half_height: f64) -> Self {
        Rect {
            min: Point::new(center.x - half_width, center.y - half_height),
            max: Point::new(center.x + half_width, center.y + half_height),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.max.x < other.min.x
            || other.max.x < self.min.x
            || self.max.y < other.min.y
            || other.max.y < self.min.y)
    }

    /// Corners in counter-clockwise order, starting at the minimum corner.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    pub fn bounding(points: &[Point]) -> Option<Rect> {
        let first = points.first()?;
        let mut rect = Rect {
            min: *first,
            max: *first,
        };

        for point in points.iter().skip(1) {
            rect.min.x = rect.min.x.min(point.x);
            rect.min.y = rect.min.y.min(point.y);
            rect.max.x = rect.max.x.max(point.x);
            rect.max.y = rect.max.y.max(point.y);
        }

        Some(rect)
    }
}

/// An open ring: the closing segment from the last point back to the first
/// one is implicit.
pub type Ring = Vec<Point>;

pub(crate) fn signed_area(ring: &[Point]) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        area += ring[i].x * ring[j].y - ring[j].x * ring[i].y;
    }
    0.5 * area
}

pub(crate) fn ring_contains(ring: &[Point], point: &Point) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);

    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// A polygon with an exterior ring and zero or more holes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Polygon { exterior, holes }
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }

    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|hole| signed_area(hole).abs()).sum();
        (signed_area(&self.exterior).abs() - holes).max(0.0)
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(&self.exterior)
    }

    /// Even-odd containment over all rings.
    pub fn contains(&self, point: &Point) -> bool {
        self.rings()
            .filter(|ring| ring_contains(ring, point))
            .count()
            % 2
            == 1
    }

    pub fn centroid(&self) -> Point {
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut total = 0.0;

        for (idx, ring) in self.rings().enumerate() {
            // Holes subtract regardless of their winding.
            let sign = if idx == 0 { 1.0 } else { -1.0 };
            let ring_sign = signed_area(ring).signum();

            for i in 0..ring.len() {
                let j = (i + 1) % ring.len();
                let cross = ring[i].x * ring[j].y - ring[j].x * ring[i].y;
                let weight = cross * ring_sign * sign;
                total += weight;
                cx += (ring[i].x + ring[j].x) * weight;
                cy += (ring[i].y + ring[j].y) * weight;
            }
        }

        if total.abs() <= EPS_DENOM || self.exterior.is_empty() {
            let count = self.exterior.len().max(1) as f64;
            let (sx, sy) = self
                .exterior
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            return Point::new(sx / count, sy / count);
        }

        let area = total * 0.5;
        Point::new(cx / (6.0 * area), cy / (6.0 * area))
    }

    /// A point strictly inside the polygon (outside every hole), found on the
    /// horizontal scanline through the widest vertical gap between vertices.
    pub fn interior_point(&self) -> Option<Point> {
        let mut ys = self
            .rings()
            .flat_map(|ring| ring.iter().map(|p| p.y))
            .collect::<Vec<_>>();
        ys.sort_by(f64::total_cmp);
        ys.dedup();

        let (y0, y1) = ys
            .windows(2)
            .map(|w| (w[0], w[1]))
            .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))?;
        let y = 0.5 * (y0 + y1);

        let mut xs = Vec::new();
        for ring in self.rings() {
            for i in 0..ring.len() {
                let a = ring[i];
                let b = ring[(i + 1) % ring.len()];
                if (a.y > y) != (b.y > y) {
                    xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        xs.sort_by(f64::total_cmp);

        xs.chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
            .filter(|(x0, x1)| x1 > x0)
            .map(|(x0, x1)| Point::new(0.5 * (x0 + x1), y))
    }
}

/// Road hierarchy. Assigned once from the source `highway` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    Motorway,
    Arterial,
    Local,
    Minor,
    NonVehicular,
}

impl RoadClass {
    pub const ALL: [RoadClass; 5] = [
        RoadClass::Motorway,
        RoadClass::Arterial,
        RoadClass::Local,
        RoadClass::Minor,
        RoadClass::NonVehicular,
    ];

    pub fn from_tag(highway: Option<&str>) -> Self {
        let Some(tag) = highway else {
            return RoadClass::Local;
        };

        match tag.trim() {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" => RoadClass::Motorway,
            "primary" | "primary_link" | "secondary" | "secondary_link" | "tertiary"
            | "tertiary_link" => RoadClass::Arterial,
            "residential" | "unclassified" | "living_street" => RoadClass::Local,
            "service" => RoadClass::Minor,
            "footway" | "cycleway" | "path" | "pedestrian" | "steps" | "bridleway" => {
                RoadClass::NonVehicular
            }
            _ => RoadClass::Local,
        }
    }

    pub fn is_vehicular(&self) -> bool {
        !matches!(self, RoadClass::NonVehicular)
    }

    /// Position in the draw order; higher values are painted later.
    pub fn draw_priority(&self) -> u8 {
        match self {
            RoadClass::NonVehicular => 0,
            RoadClass::Minor => 1,
            RoadClass::Local => 2,
            RoadClass::Arterial => 3,
            RoadClass::Motorway => 4,
        }
    }
}

impl Display for RoadClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RoadClass::Motorway => write!(f, "motorway"),
            RoadClass::Arterial => write!(f, "arterial"),
            RoadClass::Local => write!(f, "local"),
            RoadClass::Minor => write!(f, "minor"),
            RoadClass::NonVehicular => write!(f, "non_vehicular"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEdge {
    pub geometry: Vec<Point>,
    pub road_class: RoadClass,
}

/// FNV-1a over the little-endian bytes of `words`.
pub(crate) fn fnv1a(words: &[u64]) -> u64 {
    let mut hash = FNV_OFFSET;
    for word in words {
        for byte in word.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityBlock {
    pub polygon: Polygon,
    /// Hash of the block's identity: its centroid on a 1 cm grid and its area in whole square
    /// meters. Mixed with the render seed to pick a palette entry.
    pub color_index: u64,
}

impl CityBlock {
    /// Palette entry of this block for `seed`.
    pub fn palette_slot(&self, seed: u64, palette_len: usize) -> usize {
        (fnv1a(&[self.color_index, seed]) % palette_len.max(1) as u64) as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterPolygon {
    pub polygon: Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingFootprint {
    pub polygon: Polygon,
}

/// The physical product and the geographic frame it covers. Only built by
/// the size resolver, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSpec {
    width_cm: f64,
    height_cm: f64,
    extent_m: f64,
    dpi: u32,
    aspect_ratio: f64,
}

impl ProductSpec {
    pub(crate) fn new(width_cm: f64, height_cm: f64, extent_m: f64, dpi: u32) -> Self {
        ProductSpec {
            width_cm,
            height_cm,
            extent_m,
            dpi,
            aspect_ratio: width_cm / height_cm,
        }
    }

    pub fn width_cm(&self) -> f64 {
        self.width_cm
    }

    pub fn height_cm(&self) -> f64 {
        self.height_cm
    }

    /// Half of the geographic frame height, in meters.
    pub fn extent_m(&self) -> f64 {
        self.extent_m
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Size identifier used in artifact names, e.g. `50x70`.
    pub fn size_key(&self) -> String {
        format!("{}x{}", self.width_cm, self.height_cm)
    }

    /// Half width and half height of the geographic frame in meters.
    ///
    /// `half_w / half_h` equals [aspect_ratio](Self::aspect_ratio) exactly. When no half width
    /// divides back to the ratio, the half height is moved off the extent by a few ulps.
    pub fn frame_half_sizes_m(&self) -> (f64, f64) {
        let mut half_h = self.extent_m;
        for _ in 0..MAX_ULP_STEPS {
            if let Some(half_w) = exact_numerator(half_h, self.aspect_ratio) {
                return (half_w, half_h);
            }
            half_h = half_h.next_up();
        }

        (self.extent_m * self.aspect_ratio, self.extent_m)
    }

    /// Radius that covers the whole frame plus a safety margin.
    pub fn fetch_radius_m(&self) -> f64 {
        let (half_w, half_h) = self.frame_half_sizes_m();
        (half_w.powi(2) + half_h.powi(2)).sqrt().ceil() + crate::constants::FETCH_MARGIN_M
    }

    /// Raster size of the map layer at the configured density.
    pub fn pixel_size(&self) -> (u32, u32) {
        let to_px = |cm: f64| ((cm / CM_PER_INCH) * self.dpi as f64).round().max(1.0) as u32;
        (to_px(self.width_cm), to_px(self.height_cm))
    }

    /// Page size in typographic points.
    pub fn page_size_pt(&self) -> (f64, f64) {
        (cm_to_pt(self.width_cm), cm_to_pt(self.height_cm))
    }
}

const MAX_ULP_STEPS: usize = 64;

// A value within two ulps of `denominator * ratio` whose quotient rounds back to `ratio`.
fn exact_numerator(denominator: f64, ratio: f64) -> Option<f64> {
    let guess = denominator * ratio;
    let below = [guess.next_down().next_down(), guess.next_down()];
    let above = [guess.next_up(), guess.next_up().next_up()];

    std::iter::once(guess)
        .chain(below.into_iter().rev())
        .chain(above)
        .find(|candidate| candidate / denominator == ratio)
}

pub(crate) fn cm_to_pt(cm: f64) -> f64 {
    cm / CM_PER_INCH * POINTS_PER_INCH
}
