use super::{ExtractedGeometry, ResolvedStyle};
use crate::{
    constants::{COORD_PRECISION, POINTS_PER_INCH},
    error::RenderError,
    types::{Point, ProductSpec, Rect, RoadClass},
};

use svg::{
    Document,
    node::element::{Group, Path, path::Data},
};
use tiny_skia::Pixmap;
use tracing::{Level, event};

mod raster;

pub(crate) use raster::{encode_png, rasterize};

// Dash pattern of non-vehicular roads, in multiples of their stroke width.
const DASH_ON: f64 = 2.0;
const DASH_OFF: f64 = 1.5;

// Water outline width in points.
const WATER_EDGE_PT: f64 = 0.5;

/// Rounds to the fixed precision used in every written coordinate.
pub(crate) fn fixed(value: f64) -> f32 {
    ((value * COORD_PRECISION).round() / COORD_PRECISION) as f32
}

/// A polyline or ring in canvas pixels, y down.
pub(crate) type CanvasPath = Vec<(f32, f32)>;

/// One drawing primitive of the map layer, in canvas pixels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shape {
    /// Rings filled with the even-odd rule.
    Fill {
        color: &'static str,
        rings: Vec<CanvasPath>,
    },
    /// Open polylines with round caps and joins.
    Stroke {
        color: &'static str,
        width: f32,
        /// On and off lengths.
        dash: Option<(f32, f32)>,
        class: Option<RoadClass>,
        lines: Vec<CanvasPath>,
    },
}

/// Shapes drawn together, bottom first.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Layer {
    pub(crate) id: &'static str,
    pub(crate) shapes: Vec<Shape>,
}

struct DrawConfig {
    canvas_width: u32,
    canvas_height: u32,
    frame: Rect,
    px_per_pt: f64,
}

impl DrawConfig {
    fn new(spec: &ProductSpec, frame: Rect) -> Self {
        let (canvas_width, canvas_height) = spec.pixel_size();

        DrawConfig {
            canvas_width,
            canvas_height,
            frame,
            px_per_pt: spec.dpi() as f64 / POINTS_PER_INCH,
        }
    }

    // North up: y is flipped.
    fn to_canvas(&self, point: &Point) -> (f32, f32) {
        let sx = self.canvas_width as f64 / self.frame.width();
        let sy = self.canvas_height as f64 / self.frame.height();

        (
            fixed((point.x - self.frame.min.x) * sx),
            fixed((self.frame.max.y - point.y) * sy),
        )
    }

    fn path(&self, points: &[Point]) -> CanvasPath {
        points.iter().map(|p| self.to_canvas(p)).collect()
    }
}

/// The map artifact handed from the renderer to the composer.
#[derive(Debug, Clone)]
pub struct RenderedLayer {
    document: Document,
    layers: Vec<Layer>,
    spec: ProductSpec,
    style_identity: String,
    seed: u64,
}

impl RenderedLayer {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn spec(&self) -> &ProductSpec {
        &self.spec
    }

    /// `name@version` of the style the layer was drawn with.
    pub fn style_identity(&self) -> &str {
        &self.style_identity
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn to_svg_string(&self) -> String {
        self.document.to_string()
    }

    pub fn rasterize(&self) -> Result<Pixmap, RenderError> {
        let (width, height) = self.spec.pixel_size();
        rasterize(&self.to_svg_string(), width, height, false)
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        encode_png(&self.rasterize()?)
    }
}

fn background(config: &DrawConfig, style: &ResolvedStyle) -> Layer {
    let (w, h) = (config.canvas_width as f32, config.canvas_height as f32);

    Layer {
        id: "background",
        shapes: vec![Shape::Fill {
            color: style.background,
            rings: vec![vec![(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]],
        }],
    }
}

fn blocks(
    config: &DrawConfig,
    geometry: &ExtractedGeometry,
    style: &ResolvedStyle,
    seed: u64,
) -> Layer {
    let shapes = geometry
        .blocks
        .iter()
        .map(|block| Shape::Fill {
            color: style.block_color(block.palette_slot(seed, style.blocks.len())),
            rings: block.polygon.rings().map(|ring| config.path(ring)).collect(),
        })
        .collect();

    Layer { id: "blocks", shapes }
}

fn buildings(config: &DrawConfig, geometry: &ExtractedGeometry, fill: &'static str) -> Layer {
    let shapes = geometry
        .buildings
        .iter()
        .map(|building| Shape::Fill {
            color: fill,
            rings: building.polygon.rings().map(|ring| config.path(ring)).collect(),
        })
        .collect();

    Layer { id: "buildings", shapes }
}

fn water(config: &DrawConfig, geometry: &ExtractedGeometry, style: &ResolvedStyle) -> Layer {
    let edge_width = fixed(WATER_EDGE_PT * config.px_per_pt);

    let shapes = geometry
        .water
        .iter()
        .flat_map(|water| {
            let rings = water
                .polygon
                .rings()
                .map(|ring| config.path(ring))
                .collect::<Vec<_>>();
            let outline = rings
                .iter()
                .map(|ring| ring.iter().chain(ring.first()).copied().collect())
                .collect();

            [
                Shape::Fill {
                    color: style.water_fill,
                    rings,
                },
                Shape::Stroke {
                    color: style.water_edge,
                    width: edge_width,
                    dash: None,
                    class: None,
                    lines: outline,
                },
            ]
        })
        .collect();

    Layer { id: "water", shapes }
}

fn road_lines(
    config: &DrawConfig,
    geometry: &ExtractedGeometry,
    class: RoadClass,
) -> Option<Vec<CanvasPath>> {
    let lines = geometry
        .edges
        .iter()
        .filter(|edge| edge.road_class == class && !edge.geometry.is_empty())
        .map(|edge| config.path(&edge.geometry))
        .collect::<Vec<_>>();

    (!lines.is_empty()).then_some(lines)
}

fn road(
    config: &DrawConfig,
    geometry: &ExtractedGeometry,
    style: &ResolvedStyle,
    class: RoadClass,
) -> Option<Shape> {
    let lines = road_lines(config, geometry, class)?;
    let width = style.width_pt(class) * config.px_per_pt;
    let dash = (!class.is_vehicular()).then(|| (fixed(width * DASH_ON), fixed(width * DASH_OFF)));

    Some(Shape::Stroke {
        color: style.road_color(class),
        width: fixed(width),
        dash,
        class: Some(class),
        lines,
    })
}

// Every casing sits below every road, so crossings stay open.
fn casing(
    config: &DrawConfig,
    geometry: &ExtractedGeometry,
    style: &ResolvedStyle,
    class: RoadClass,
) -> Option<Shape> {
    let color = style.casing?;
    let width = style.casing_width_pt(class) * config.px_per_pt;
    if width <= 0.0 {
        return None;
    }

    Some(Shape::Stroke {
        color,
        width: fixed(width),
        dash: None,
        class: Some(class),
        lines: road_lines(config, geometry, class)?,
    })
}

fn path_data(paths: &[CanvasPath], close: bool) -> Data {
    paths.iter().fold(Data::new(), |data, path| {
        let mut points = path.iter().copied();
        let Some(first) = points.next() else {
            return data;
        };

        let data = points.fold(data.move_to(first), |data, point| data.line_to(point));
        if close { data.close() } else { data }
    })
}

fn svg_path(shape: &Shape) -> Path {
    match shape {
        Shape::Fill { color, rings } => Path::new()
            .set("fill", *color)
            .set("fill-rule", "evenodd")
            .set("stroke", "none")
            .set("d", path_data(rings, true)),
        Shape::Stroke {
            color,
            width,
            dash,
            class,
            lines,
        } => {
            let mut path = Path::new();
            if let Some(class) = class {
                path = path.set("class", class.to_string());
            }
            path = path
                .set("fill", "none")
                .set("stroke", *color)
                .set("stroke-width", *width)
                .set("stroke-linecap", "round")
                .set("stroke-linejoin", "round");
            if let Some((on, off)) = dash {
                path = path.set("stroke-dasharray", format!("{} {}", on, off));
            }

            path.set("d", path_data(lines, false))
        }
    }
}

fn svg_document(config: &DrawConfig, layers: &[Layer]) -> Document {
    layers.iter().fold(
        Document::new()
            .set("width", config.canvas_width)
            .set("height", config.canvas_height)
            .set(
                "viewBox",
                format!("0 0 {} {}", config.canvas_width, config.canvas_height),
            ),
        |document, layer| {
            let group = layer
                .shapes
                .iter()
                .fold(Group::new().set("id", layer.id), |group, shape| {
                    group.add(svg_path(shape))
                });
            document.add(group)
        },
    )
}

/// Draws the map layer at the product's pixel size.
///
/// Blocks pick their palette entry from their identity hash and `seed`; nothing else about
/// the output depends on the seed.
pub fn render(
    geometry: &ExtractedGeometry,
    style: &ResolvedStyle,
    spec: &ProductSpec,
    seed: u64,
) -> Result<RenderedLayer, RenderError> {
    let start = std::time::Instant::now();
    let config = DrawConfig::new(spec, geometry.frame);

    if config.canvas_width == 0 || config.canvas_height == 0 {
        return Err(RenderError::Allocation {
            width: config.canvas_width,
            height: config.canvas_height,
        });
    }

    let mut layers = vec![
        background(&config, style),
        blocks(&config, geometry, style, seed),
    ];
    if let Some(fill) = style.buildings {
        layers.push(buildings(&config, geometry, fill));
    }
    layers.push(water(&config, geometry, style));
    if style.casing.is_some() {
        layers.push(Layer {
            id: "casing",
            shapes: style
                .draw_order()
                .iter()
                .filter_map(|class| casing(&config, geometry, style, *class))
                .collect(),
        });
    }
    layers.push(Layer {
        id: "roads",
        shapes: style
            .draw_order()
            .iter()
            .filter_map(|class| road(&config, geometry, style, *class))
            .collect(),
    });

    let document = svg_document(&config, &layers);

    event!(
        Level::DEBUG,
        "Rendered {} blocks, {} water polygons, {} buildings and {} edges at {}x{}px in {:.2}ms",
        geometry.blocks.len(),
        geometry.water.len(),
        geometry.buildings.len(),
        geometry.edges.len(),
        config.canvas_width,
        config.canvas_height,
        crate::millis(start.elapsed())
    );

    Ok(RenderedLayer {
        document,
        layers,
        spec: spec.clone(),
        style_identity: style.identity.clone(),
        seed,
    })
}
