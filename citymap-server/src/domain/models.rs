use citymap_core::{CitymapError, GeoPoint, MapStyle, SizeRequest, size_keys};

use derive_more::From;
use thiserror::Error;
use uuid::Uuid;

/// A rendered, uniquely identifiable map preview.
#[derive(Clone, Debug, PartialEq)]
pub struct Preview {
    id: Uuid,
    request: CreatePreviewRequest,
    png: Vec<u8>,
}

impl Preview {
    pub fn new(id: Uuid, request: CreatePreviewRequest, png: Vec<u8>) -> Self {
        Self { id, request, png }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn request(&self) -> &CreatePreviewRequest {
        &self.request
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }
}

/// A valid WGS84 center.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Center(GeoPoint);

#[derive(Clone, Debug, Error)]
#[error("coordinates {lat}, {lon} are not a valid WGS84 position")]
pub struct InvalidCenterError {
    pub lat: f64,
    pub lon: f64,
}

impl Center {
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCenterError> {
        let point = GeoPoint::new(lat, lon);
        if !point.is_valid() {
            return Err(InvalidCenterError { lat, lon });
        }

        Ok(Self(point))
    }

    pub fn point(&self) -> GeoPoint {
        self.0
    }
}

/// One of the named product sizes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeKey(String);

#[derive(Clone, Debug, Error)]
#[error("size key {0:?} is not known")]
pub struct SizeKeyNotKnownError(pub String);

impl SizeKey {
    pub fn new(raw: &str) -> Result<Self, SizeKeyNotKnownError> {
        let key = raw.trim();
        if !size_keys().any(|known| known == key) {
            return Err(SizeKeyNotKnownError(raw.to_string()));
        }

        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Geographic half-height of the preview in meters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extent(f64);

#[derive(Clone, Debug, Error)]
#[error("extent must be a positive number of meters, got {0}")]
pub struct ExtentMustBePositiveError(pub f64);

impl Extent {
    pub fn new(raw: f64) -> Result<Self, ExtentMustBePositiveError> {
        if !raw.is_finite() || raw <= 0.0 {
            return Err(ExtentMustBePositiveError(raw));
        }

        Ok(Self(raw))
    }

    pub fn meters(&self) -> f64 {
        self.0
    }
}

#[derive(Clone, Debug, Error)]
#[error("map style is not known")]
pub struct MapStyleNotKnownError;

/// The fields required by the domain to render a [Preview].
#[derive(Clone, Debug, PartialEq, From)]
pub struct CreatePreviewRequest {
    center: Center,
    size_key: SizeKey,
    extent: Extent,
    style: MapStyle,
    seed: u64,
}

impl CreatePreviewRequest {
    pub fn new(center: Center, size_key: SizeKey, extent: Extent, style: MapStyle, seed: u64) -> Self {
        Self {
            center,
            size_key,
            extent,
            style,
            seed,
        }
    }

    pub fn center(&self) -> GeoPoint {
        self.center.point()
    }

    pub fn size_key(&self) -> &SizeKey {
        &self.size_key
    }

    pub fn style(&self) -> MapStyle {
        self.style
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The core size request for this preview at `dpi`.
    pub fn size_request(&self, dpi: u32) -> SizeRequest {
        SizeRequest::from_key(self.size_key.as_str())
            .with_extent(self.extent.meters())
            .with_dpi(dpi)
    }
}

#[derive(Debug, Error)]
pub enum CreatePreviewError {
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("no map data: {0}")]
    NoData(String),
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<CitymapError> for CreatePreviewError {
    fn from(err: CitymapError) -> Self {
        match err {
            CitymapError::InvalidSize(_)
            | CitymapError::InvalidStyle(_)
            | CitymapError::LayoutOverflow(_) => CreatePreviewError::Rejected(err.to_string()),
            CitymapError::NoData(_) => CreatePreviewError::NoData(err.to_string()),
            CitymapError::Render(_) => CreatePreviewError::Unknown(anyhow::Error::new(err)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn value_objects_validate_their_input() {
        assert!(Center::new(47.4979, 19.0402).is_ok());
        assert!(Center::new(95.0, 19.0).is_err());
        assert!(Center::new(f64::NAN, 19.0).is_err());

        assert_eq!(SizeKey::new(" 50x70 ").unwrap().as_str(), "50x70");
        assert!(SizeKey::new("45x45").is_err());

        assert!(Extent::new(3000.0).is_ok());
        assert!(Extent::new(0.0).is_err());
        assert!(Extent::new(f64::INFINITY).is_err());
    }

    #[test]
    fn core_errors_map_to_domain_errors() {
        let rejected = CitymapError::from(citymap_core::InvalidSizeError::ZeroDpi);
        assert!(matches!(
            CreatePreviewError::from(rejected),
            CreatePreviewError::Rejected(_)
        ));

        let no_data = CitymapError::from(citymap_core::NoDataError::InvalidCenter(GeoPoint::new(
            99.0, 0.0,
        )));
        assert!(matches!(
            CreatePreviewError::from(no_data),
            CreatePreviewError::NoData(_)
        ));

        let render = CitymapError::from(citymap_core::RenderError::Encode("disk full".to_string()));
        assert!(matches!(
            CreatePreviewError::from(render),
            CreatePreviewError::Unknown(_)
        ));
    }
}
