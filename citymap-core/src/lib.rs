mod algos;
mod constants;
mod error;
pub mod source;
mod types;

use tracing::{Level, event, span};

pub use algos::{
    Composition, ExtractOptions, ExtractedGeometry, Logo, MapStyle, RenderedLayer, ResolvedStyle,
    SizeRequest, SizeSource, StyleConfig, TitleBlock, Typography, compose, extent_scale_factor,
    extract, render, resolve_size, resolve_style, size_keys, to_dms,
};
pub use error::{
    CitymapError, CitymapResult, GeometryRepairFailure, InvalidSizeError, InvalidStyleError,
    LayoutOverflowError, NoDataError, RenderError, Stage,
};
pub use source::GeometrySource;
pub use types::{
    BuildingFootprint, CityBlock, ClassifiedEdge, GeoBounds, GeoPoint, Point, Polygon, ProductSpec,
    Rect, Ring, RoadClass, WaterPolygon,
};

/// Milliseconds in `elapsed`, keeping the fraction for timing logs.
pub(crate) fn millis(elapsed: std::time::Duration) -> f64 {
    elapsed.as_secs_f64() * 1e3
}

/// Everything one render needs besides the geometry source.
#[derive(Debug, Clone)]
pub struct CitymapRequest {
    pub center: GeoPoint,
    pub size: SizeRequest,
    pub style: MapStyle,
    pub seed: u64,
    pub include_non_vehicular: bool,
    /// Draw building footprints where the style has a building color.
    pub buildings: bool,
    pub titles: TitleBlock,
    pub logo: Option<Logo>,
}

impl CitymapRequest {
    pub fn new(center: GeoPoint, size: SizeRequest) -> Self {
        CitymapRequest {
            center,
            size,
            style: MapStyle::default(),
            seed: 0,
            include_non_vehicular: false,
            buildings: true,
            titles: TitleBlock::with_coordinates("", center),
            logo: None,
        }
    }
}

/// The map layer alone, with the geometry warnings collected on the way.
#[derive(Debug, Clone)]
pub struct MapLayer {
    pub layer: RenderedLayer,
    pub warnings: Vec<GeometryRepairFailure>,
}

#[derive(Debug, Clone)]
pub struct CitymapOutput {
    pub layer: RenderedLayer,
    pub composition: Composition,
    pub warnings: Vec<GeometryRepairFailure>,
}

/// Resolves, extracts and renders the map layer of `request`.
///
/// Size and style are validated before `source` is queried.
pub fn create_map_layer<S: GeometrySource + ?Sized>(
    request: &CitymapRequest,
    source: &S,
) -> CitymapResult<MapLayer> {
    let span = span!(Level::DEBUG, "create_map_layer");
    let _guard = span.enter();

    let start = std::time::Instant::now();

    let spec = resolve_size(&request.size)?;
    let style = resolve_style(request.style.config(), &spec)?;

    let options = ExtractOptions {
        include_non_vehicular: request.include_non_vehicular,
        buildings: request.buildings && style.buildings.is_some(),
    };
    let geometry = extract(request.center, &spec, options, source)?;

    let extract_time = std::time::Instant::now();
    event!(
        Level::DEBUG,
        "Extracted geometry for {} in {:.2}ms",
        spec.size_key(),
        millis(extract_time.duration_since(start))
    );

    let layer = render(&geometry, &style, &spec, request.seed)?;

    event!(
        Level::DEBUG,
        "Rendered map layer in {:.2}ms",
        millis(extract_time.elapsed())
    );

    Ok(MapLayer {
        layer,
        warnings: geometry.warnings,
    })
}

/// Runs the whole pipeline and returns the composed page together with its map layer.
pub fn create_citymap<S: GeometrySource + ?Sized>(
    request: &CitymapRequest,
    source: &S,
) -> CitymapResult<CitymapOutput> {
    let span = span!(Level::DEBUG, "create_citymap");
    let _guard = span.enter();

    let MapLayer { layer, warnings } = create_map_layer(request, source)?;

    let compose_start = std::time::Instant::now();
    let composition = compose(
        &layer,
        &request.style.config().typography,
        &request.titles,
        request.logo.as_ref(),
    )?;

    event!(
        Level::DEBUG,
        "Composed page in {:.2}ms",
        millis(compose_start.elapsed())
    );

    Ok(CitymapOutput {
        layer,
        composition,
        warnings,
    })
}
