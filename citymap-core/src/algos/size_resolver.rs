use crate::{
    constants::{DEFAULT_DPI, DEFAULT_EXTENT_M, SIZES_CM},
    error::InvalidSizeError,
    types::ProductSpec,
};

use serde::Serialize;
use tracing::event;

/// How the physical size of a product is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeSource {
    /// Explicit width and height in centimeters.
    Explicit { width_cm: f64, height_cm: f64 },
    /// One of the named sizes, e.g. `50x70`.
    Key(String),
    /// A free-form `WIDTHxHEIGHT` string in centimeters, e.g. `45x60` or `42.5 x 60`.
    Dimensions(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeRequest {
    pub size: SizeSource,
    /// Geographic half-height in meters. Defaults to 5000 m.
    pub extent_m: Option<f64>,
    /// Defaults to 300.
    pub dpi: Option<u32>,
}

impl SizeRequest {
    pub fn explicit(width_cm: f64, height_cm: f64) -> Self {
        SizeRequest {
            size: SizeSource::Explicit {
                width_cm,
                height_cm,
            },
            extent_m: None,
            dpi: None,
        }
    }

    pub fn from_key(key: impl Into<String>) -> Self {
        SizeRequest {
            size: SizeSource::Key(key.into()),
            extent_m: None,
            dpi: None,
        }
    }

    pub fn from_dimensions(dimensions: impl Into<String>) -> Self {
        SizeRequest {
            size: SizeSource::Dimensions(dimensions.into()),
            extent_m: None,
            dpi: None,
        }
    }

    pub fn with_extent(mut self, extent_m: f64) -> Self {
        self.extent_m = Some(extent_m);
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }
}

/// Named product sizes, in the order they are offered.
pub fn size_keys() -> impl Iterator<Item = &'static str> {
    SIZES_CM.iter().map(|(key, _, _)| *key)
}

fn lookup_key(key: &str) -> Result<(f64, f64), InvalidSizeError> {
    SIZES_CM
        .iter()
        .find(|(known, _, _)| *known == key.trim())
        .map(|(_, width, height)| (*width, *height))
        .ok_or_else(|| InvalidSizeError::UnknownSizeKey {
            key: key.to_string(),
            known: size_keys().collect::<Vec<_>>().join(", "),
        })
}

fn parse_dimensions(dimensions: &str) -> Result<(f64, f64), InvalidSizeError> {
    let malformed = || InvalidSizeError::Malformed(dimensions.to_string());

    let lowered = dimensions.to_ascii_lowercase();
    let (width, height) = lowered.split_once('x').ok_or_else(malformed)?;

    let width = width.trim().parse::<f64>().map_err(|_| malformed())?;
    let height = height.trim().parse::<f64>().map_err(|_| malformed())?;

    Ok((width, height))
}

/// Turns a size request into an immutable [ProductSpec].
///
/// The geographic frame always keeps the aspect ratio of the physical product: the half-height
/// is `extent_m` and the half-width is `extent_m * width_cm / height_cm`.
pub fn resolve_size(request: &SizeRequest) -> Result<ProductSpec, InvalidSizeError> {
    let (width_cm, height_cm) = match &request.size {
        SizeSource::Explicit {
            width_cm,
            height_cm,
        } => (*width_cm, *height_cm),
        SizeSource::Key(key) => lookup_key(key)?,
        SizeSource::Dimensions(dimensions) => parse_dimensions(dimensions)?,
    };

    if !width_cm.is_finite() || width_cm <= 0.0 {
        return Err(InvalidSizeError::NonPositiveWidth(width_cm));
    }

    if !height_cm.is_finite() || height_cm <= 0.0 {
        return Err(InvalidSizeError::NonPositiveHeight(height_cm));
    }

    let extent_m = request.extent_m.unwrap_or(DEFAULT_EXTENT_M);
    if !extent_m.is_finite() || extent_m <= 0.0 {
        return Err(InvalidSizeError::NonPositiveExtent(extent_m));
    }

    let dpi = request.dpi.unwrap_or(DEFAULT_DPI);
    if dpi == 0 {
        return Err(InvalidSizeError::ZeroDpi);
    }

    let spec = ProductSpec::new(width_cm, height_cm, extent_m, dpi);

    event!(
        tracing::Level::DEBUG,
        "Resolved size {} with extent {}m at {} dpi",
        spec.size_key(),
        extent_m,
        dpi
    );

    Ok(spec)
}
