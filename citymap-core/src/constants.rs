use crate::types::RoadClass;

pub(crate) const CM_PER_INCH: f64 = 2.54;
pub(crate) const POINTS_PER_INCH: f64 = 72.0;

pub(crate) const DEFAULT_EXTENT_M: f64 = 5000.0;
pub(crate) const DEFAULT_DPI: u32 = 300;

// Named product sizes in centimeters (width, height).
pub(crate) const SIZES_CM: [(&str, f64, f64); 10] = [
    ("30x40", 30.0, 40.0),
    ("40x30", 40.0, 30.0),
    ("40x50", 40.0, 50.0),
    ("50x40", 50.0, 40.0),
    ("50x70", 50.0, 70.0),
    ("70x50", 70.0, 50.0),
    ("61x91", 61.0, 91.0),
    ("91x61", 91.0, 61.0),
    ("32x32", 32.0, 32.0),
    ("50x50", 50.0, 50.0),
];

// Extra radius fetched around the frame's half diagonal, so that clipping
// never exposes the edge of the queried data.
pub(crate) const FETCH_MARGIN_M: f64 = 300.0;

pub(crate) const EARTH_RADIUS_M: f64 = 6_371_008.8;

// Planar vertices are snapped to this grid (1 cm).
pub(crate) const SNAP_SCALE: f64 = 100.0;
pub(crate) const EPS_POS: f64 = 1e-6;
pub(crate) const EPS_DENOM: f64 = 1e-12;
pub(crate) const EPS_ANG: f64 = 1e-9;
pub(crate) const MIN_RING_AREA_M2: f64 = 0.5;
// Smaller footprints (sheds, kiosks) vanish at print scale.
pub(crate) const MIN_BUILDING_AREA_M2: f64 = 12.0;

pub(crate) const REFERENCE_EXTENT_M: f64 = 2000.0;
pub(crate) const MIN_EXTENT_SCALE: f64 = 0.15;
pub(crate) const MAX_EXTENT_SCALE: f64 = 3.0;

// Road casing width relative to the road it outlines.
pub(crate) const CASING_WIDTH_RATIO: f64 = 1.6;

pub(crate) const BORDER_CM: f64 = 1.0;
pub(crate) const STRIP_CM: f64 = 4.0;

// Coordinates written into documents are rounded to this many decimals.
pub(crate) const COORD_PRECISION: f64 = 100.0;

pub(crate) const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
pub(crate) const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// Draw order, bottom first: the last class ends up on top of crossings.
pub(crate) const DRAW_ORDER: [RoadClass; 5] = [
    RoadClass::NonVehicular,
    RoadClass::Minor,
    RoadClass::Local,
    RoadClass::Arterial,
    RoadClass::Motorway,
];
