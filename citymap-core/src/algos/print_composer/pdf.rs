use super::{Composition, Logo, PlacedText, is_bold};
use crate::{
    algos::map_drawer::{CanvasPath, Shape},
    error::RenderError,
    types::Rect,
};

use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject,
    IndirectFontRef, Line, LineCapStyle, LineDashPattern, LineJoinStyle, Mm,
    PdfDocument, PdfLayerReference, Point, Polygon, Px, Rgb,
    path::{PaintMode, WindingOrder},
};
use tiny_skia::Pixmap;
use tracing::{Level, event};

const MM_PER_PT: f64 = 25.4 / 72.0;

fn mm(pt: f64) -> Mm {
    Mm((pt * MM_PER_PT) as f32)
}

fn hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    match digits.len() {
        3 => {
            let (r, g, b) = (
                channel(&digits[0..1])?,
                channel(&digits[1..2])?,
                channel(&digits[2..3])?,
            );
            Some((r * 17, g * 17, b * 17))
        }
        6 => Some((
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        _ => None,
    }
}

// Style colors are validated upstream; anything else prints black.
fn color(hex: &str) -> Color {
    let (r, g, b) = hex_rgb(hex).unwrap_or_default();
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

/// Page coordinates in points, top left origin, to PDF user space.
struct PageSpace {
    height_pt: f64,
}

impl PageSpace {
    fn point(&self, (x, y): (f64, f64)) -> Point {
        Point::new(mm(x), mm(self.height_pt - y))
    }

    fn rect(&self, rect: &Rect) -> Vec<(Point, bool)> {
        [
            (rect.min.x, rect.min.y),
            (rect.max.x, rect.min.y),
            (rect.max.x, rect.max.y),
            (rect.min.x, rect.max.y),
        ]
        .into_iter()
        .map(|p| (self.point(p), false))
        .collect()
    }
}

/// Places the map canvas in its area the way `xMidYMid slice` does: scaled to cover the area,
/// centered, and cropped by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CanvasPlacement {
    scale: f64,
    offset: (f64, f64),
}

impl CanvasPlacement {
    fn new((width, height): (u32, u32), area: &Rect) -> Self {
        let (width, height) = (width.max(1) as f64, height.max(1) as f64);
        let scale = (area.width() / width).max(area.height() / height);

        CanvasPlacement {
            scale,
            offset: (
                area.min.x + (area.width() - width * scale) / 2.0,
                area.min.y + (area.height() - height * scale) / 2.0,
            ),
        }
    }

    fn place(&self, (x, y): (f32, f32)) -> (f64, f64) {
        (
            self.offset.0 + x as f64 * self.scale,
            self.offset.1 + y as f64 * self.scale,
        )
    }
}

fn pdf_path(path: &CanvasPath, placement: &CanvasPlacement, page: &PageSpace) -> Vec<(Point, bool)> {
    path.iter()
        .map(|p| (page.point(placement.place(*p)), false))
        .collect()
}

fn draw_shape(
    layer: &PdfLayerReference,
    shape: &Shape,
    placement: &CanvasPlacement,
    page: &PageSpace,
) {
    match shape {
        Shape::Fill { color: fill, rings } => {
            if rings.is_empty() {
                return;
            }

            layer.set_fill_color(color(fill));
            layer.add_polygon(Polygon {
                rings: rings
                    .iter()
                    .map(|ring| pdf_path(ring, placement, page))
                    .collect(),
                mode: PaintMode::Fill,
                winding_order: WindingOrder::EvenOdd,
            });
        }
        Shape::Stroke {
            color: stroke,
            width,
            dash,
            lines,
            ..
        } => {
            let dash_pattern = match dash {
                Some((on, off)) => LineDashPattern {
                    dash_1: Some((*on as f64 * placement.scale).round().max(1.0) as i64),
                    gap_1: Some((*off as f64 * placement.scale).round().max(1.0) as i64),
                    ..LineDashPattern::default()
                },
                None => LineDashPattern::default(),
            };

            layer.set_outline_color(color(stroke));
            layer.set_outline_thickness((*width as f64 * placement.scale) as f32);
            layer.set_line_dash_pattern(dash_pattern);

            for line in lines.iter().filter(|line| line.len() >= 2) {
                layer.add_line(Line {
                    points: pdf_path(line, placement, page),
                    is_closed: false,
                });
            }
        }
    }
}

fn draw_text(layer: &PdfLayerReference, text: &PlacedText, font: &IndirectFontRef, page: &PageSpace) {
    layer.begin_text_section();
    layer.set_font(font, text.size as f32);
    layer.set_character_spacing(text.tracking as f32);
    layer.set_text_cursor(mm(text.x), mm(page.height_pt - text.baseline));
    layer.write_text(text.content.as_str(), font);
    layer.end_text_section();
}

/// The logo flattened onto `background`, as 8 bit RGB.
fn logo_image(logo: &Logo, background: &str) -> Result<ImageXObject, RenderError> {
    let pixmap = Pixmap::decode_png(&logo.png).map_err(|e| RenderError::Parse(e.to_string()))?;
    let (br, bg, bb) = hex_rgb(background).unwrap_or((255, 255, 255));

    // Pixels are premultiplied, so the background only fills what alpha leaves.
    let over = |channel: u8, back: u8, alpha: u8| {
        (channel as u32 + back as u32 * (255 - alpha as u32) / 255).min(255) as u8
    };

    let image_data = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let alpha = px.alpha();
            [
                over(px.red(), br, alpha),
                over(px.green(), bg, alpha),
                over(px.blue(), bb, alpha),
            ]
        })
        .collect();

    Ok(ImageXObject {
        width: Px(pixmap.width() as usize),
        height: Px(pixmap.height() as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data,
        image_filter: None,
        smask: None,
        clipping_bbox: None,
    })
}

pub(super) fn write(composition: &Composition) -> Result<Vec<u8>, RenderError> {
    let start = std::time::Instant::now();

    let (page_width, page_height) = composition.spec.page_size_pt();
    let page = PageSpace {
        height_pt: page_height,
    };

    let (doc, page_index, layer_index) = PdfDocument::new(
        format!("citymap {}", composition.spec.size_key()),
        mm(page_width),
        mm(page_height),
        "page",
    );
    let layer = doc.get_page(page_index).get_layer(layer_index);

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Encode(e.to_string()))?;

    let full_page = Rect {
        min: crate::types::Point::ZERO,
        max: crate::types::Point::new(page_width, page_height),
    };
    layer.set_fill_color(color(composition.frame_color));
    layer.add_polygon(Polygon {
        rings: vec![page.rect(&full_page)],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });

    let placement = CanvasPlacement::new(composition.spec.pixel_size(), &composition.map_area);

    layer.save_graphics_state();
    layer.add_polygon(Polygon {
        rings: vec![page.rect(&composition.map_area)],
        mode: PaintMode::Clip,
        winding_order: WindingOrder::NonZero,
    });
    layer.set_line_cap_style(LineCapStyle::Round);
    layer.set_line_join_style(LineJoinStyle::Round);

    let mut shapes = 0_usize;
    for map_layer in composition.layer.layers() {
        for shape in &map_layer.shapes {
            draw_shape(&layer, shape, &placement, &page);
            shapes += 1;
        }
    }
    layer.restore_graphics_state();

    layer.set_fill_color(color(composition.text_fill));
    for text in &composition.texts {
        let font = if is_bold(text.font) { &bold } else { &regular };
        draw_text(&layer, text, font, &page);
    }

    if let Some((logo, placed)) = &composition.logo {
        let image = logo_image(logo, composition.frame_color)?;
        let (width_px, height_px) = (image.width.0.max(1) as f64, image.height.0.max(1) as f64);

        // At 72 dpi one pixel is one point.
        Image::from(image).add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(mm(placed.min.x)),
                translate_y: Some(mm(page_height - placed.max.y)),
                scale_x: Some((placed.width() / width_px) as f32),
                scale_y: Some((placed.height() / height_px) as f32),
                dpi: Some(72.0),
                ..ImageTransform::default()
            },
        );
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| RenderError::Encode(e.to_string()))?;

    event!(
        Level::DEBUG,
        "Wrote {} PDF page ({} shapes, {} bytes) in {:.2}ms",
        composition.spec.size_key(),
        shapes,
        bytes.len(),
        crate::millis(start.elapsed())
    );

    Ok(bytes)
}
