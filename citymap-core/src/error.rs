use crate::types::{GeoPoint, Point, RoadClass};

use std::fmt::{Display, Formatter};

use serde::Serialize;
use thiserror::Error;

pub type CitymapResult<T> = Result<T, CitymapError>;

/// Pipeline stage a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SizeResolution,
    GeometryExtraction,
    Styling,
    Rendering,
    Composition,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::SizeResolution => write!(f, "size resolution"),
            Stage::GeometryExtraction => write!(f, "geometry extraction"),
            Stage::Styling => write!(f, "styling"),
            Stage::Rendering => write!(f, "rendering"),
            Stage::Composition => write!(f, "composition"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidSizeError {
    #[error("width must be positive, got {0} cm")]
    NonPositiveWidth(f64),
    #[error("height must be positive, got {0} cm")]
    NonPositiveHeight(f64),
    #[error("extent must be positive, got {0} m")]
    NonPositiveExtent(f64),
    #[error("dpi must be greater than zero")]
    ZeroDpi,
    #[error(r#"unknown size key "{key}", expected one of: {known}"#)]
    UnknownSizeKey { key: String, known: String },
    #[error(r#"malformed size "{0}", expected WIDTHxHEIGHT in centimeters"#)]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidStyleError {
    #[error("style {style} has no width multiplier for {class} roads")]
    MissingMultiplier { style: String, class: RoadClass },
    #[error("style {style} has an invalid width multiplier {value} for {class} roads")]
    InvalidMultiplier {
        style: String,
        class: RoadClass,
        value: f64,
    },
    #[error("style {style} is missing the `{field}` color")]
    MissingColor { style: String, field: &'static str },
    #[error(r#"style {style} has an invalid `{field}` color "{value}""#)]
    InvalidColor {
        style: String,
        field: &'static str,
        value: String,
    },
    #[error("style {style} has an empty block palette")]
    EmptyPalette { style: String },
    #[error("style {style} has an invalid `{field}` value {value}")]
    InvalidValue {
        style: String,
        field: &'static str,
        value: f64,
    },
}

#[derive(Debug, Error)]
pub enum NoDataError {
    #[error("center {0} is not a valid WGS84 coordinate")]
    InvalidCenter(GeoPoint),
    #[error("geometry source failed around {center}")]
    SourceFailed {
        center: GeoPoint,
        #[source]
        source: anyhow::Error,
    },
    #[error("no road geometry inside the {width_m:.0} x {height_m:.0} m frame around {center}")]
    EmptyExtent {
        center: GeoPoint,
        width_m: f64,
        height_m: f64,
    },
}

/// A single polygon that was dropped during extraction. Never fatal.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("dropped {kind} polygon near {near}: {reason}")]
pub struct GeometryRepairFailure {
    pub kind: &'static str,
    pub near: Point,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("cannot allocate a {width}x{height} raster")]
    Allocation { width: u32, height: u32 },
    #[error("cannot parse the rendered document: {0}")]
    Parse(String),
    #[error("cannot encode output: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{field} needs {required_pt:.1} pt but only {available_pt:.1} pt fit in the bottom strip at the minimum type size"
)]
pub struct LayoutOverflowError {
    pub field: &'static str,
    pub required_pt: f64,
    pub available_pt: f64,
}

#[derive(Debug, Error)]
pub enum CitymapError {
    #[error("size resolution failed: {0}")]
    InvalidSize(#[from] InvalidSizeError),
    #[error("styling failed: {0}")]
    InvalidStyle(#[from] InvalidStyleError),
    #[error("geometry extraction failed: {0}")]
    NoData(#[from] NoDataError),
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("composition failed: {0}")]
    LayoutOverflow(#[from] LayoutOverflowError),
}

impl CitymapError {
    pub fn stage(&self) -> Stage {
        match self {
            CitymapError::InvalidSize(_) => Stage::SizeResolution,
            CitymapError::InvalidStyle(_) => Stage::Styling,
            CitymapError::NoData(_) => Stage::GeometryExtraction,
            CitymapError::Render(_) => Stage::Rendering,
            CitymapError::LayoutOverflow(_) => Stage::Composition,
        }
    }
}
