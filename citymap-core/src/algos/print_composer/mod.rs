/*!
   Module `print_composer` lays the map layer out on the printable page.

   The page is the physical product size in points. A uniform border frames the map on the
   left, right and top, and a strip at the bottom carries the optional logo (left) and the
   title block (right). Everything is measured with built-in font metrics, so the layout never
   depends on the fonts installed on the machine.
*/

mod pdf;
mod typography;

pub use typography::to_dms;

use super::{RenderedLayer, Typography, map_drawer};
use crate::{
    error::{LayoutOverflowError, RenderError},
    types::{GeoPoint, Point, ProductSpec, Rect, cm_to_pt},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use svg::{
    Document,
    node::element::{Image, Rectangle, Text},
};
use tiny_skia::Pixmap;
use tracing::{Level, event};

use map_drawer::fixed;
use typography::{fit_size, text_width_pt};

// Horizontal gap kept between the logo and the title block.
const LOGO_GAP_CM: f64 = 1.0;

const FONT_FAMILY: &str = "Helvetica, Arial, sans-serif";

/// Title and subtitle printed in the bottom strip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleBlock {
    pub title: String,
    /// Printed upper-cased.
    pub subtitle: String,
}

impl TitleBlock {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        TitleBlock {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }

    /// Uses the center coordinates, in degrees, minutes and seconds, as the subtitle.
    pub fn with_coordinates(title: impl Into<String>, center: GeoPoint) -> Self {
        TitleBlock::new(title, to_dms(center))
    }
}

/// A PNG logo, kept encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    png: Vec<u8>,
    width_px: u32,
    height_px: u32,
}

impl Logo {
    pub fn from_png(png: Vec<u8>) -> Result<Self, RenderError> {
        let pixmap = Pixmap::decode_png(&png).map_err(|e| RenderError::Parse(e.to_string()))?;

        Ok(Logo {
            width_px: pixmap.width(),
            height_px: pixmap.height(),
            png,
        })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width_px as f64 / self.height_px.max(1) as f64
    }

    fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// A line of text on the page, positioned by the left end of its baseline.
#[derive(Debug, Clone, PartialEq)]
struct PlacedText {
    content: String,
    font: &'static str,
    x: f64,
    baseline: f64,
    size: f64,
    tracking: f64,
}

/// The final page. Areas are in points, measured from the top left corner of the page.
#[derive(Debug, Clone)]
pub struct Composition {
    document: Document,
    layer: RenderedLayer,
    spec: ProductSpec,
    style_identity: String,
    frame_color: &'static str,
    text_fill: &'static str,
    map_area: Rect,
    strip: Rect,
    texts: Vec<PlacedText>,
    logo: Option<(Logo, Rect)>,
    title_size_pt: f64,
    subtitle_size_pt: f64,
}

impl Composition {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn spec(&self) -> &ProductSpec {
        &self.spec
    }

    pub fn style_identity(&self) -> &str {
        &self.style_identity
    }

    pub fn map_area(&self) -> Rect {
        self.map_area
    }

    pub fn strip(&self) -> Rect {
        self.strip
    }

    /// Title and subtitle sizes after shrinking to fit.
    pub fn text_sizes_pt(&self) -> (f64, f64) {
        (self.title_size_pt, self.subtitle_size_pt)
    }

    /// `citymap_{W}x{H}_{timestamp}.{ext}`.
    pub fn file_name(&self, timestamp: &str, ext: &str) -> String {
        format!("citymap_{}_{}.{}", self.spec.size_key(), timestamp, ext)
    }

    pub fn to_svg_string(&self) -> String {
        self.document.to_string()
    }

    /// Rasterizes the page at the product resolution.
    pub fn rasterize(&self) -> Result<Pixmap, RenderError> {
        let (width, height) = self.spec.pixel_size();
        map_drawer::rasterize(&self.to_svg_string(), width, height, true)
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        map_drawer::encode_png(&self.rasterize()?)
    }

    /// Writes the page as a one page vector PDF of the product size.
    pub fn to_pdf(&self) -> Result<Vec<u8>, RenderError> {
        pdf::write(self)
    }
}

fn area(rect: &Rect) -> Rectangle {
    Rectangle::new()
        .set("x", fixed(rect.min.x))
        .set("y", fixed(rect.min.y))
        .set("width", fixed(rect.width()))
        .set("height", fixed(rect.height()))
}

fn is_bold(font: &str) -> bool {
    font.ends_with("Bold")
}

fn text(placed: &PlacedText, fill: &str) -> Text {
    let weight = if is_bold(placed.font) { "bold" } else { "normal" };

    let text = Text::new(placed.content.as_str())
        .set("x", fixed(placed.x))
        .set("y", fixed(placed.baseline))
        .set("font-family", FONT_FAMILY)
        .set("font-weight", weight)
        .set("font-size", fixed(placed.size))
        .set("fill", fill);

    if placed.tracking > 0.0 {
        text.set("letter-spacing", fixed(placed.tracking))
    } else {
        text
    }
}

/// Places `layer` on its page together with the title block and an optional logo.
pub fn compose(
    layer: &RenderedLayer,
    typo: &Typography,
    titles: &TitleBlock,
    logo: Option<&Logo>,
) -> Result<Composition, LayoutOverflowError> {
    let spec = layer.spec();
    let (page_width, page_height) = spec.page_size_pt();
    let border = cm_to_pt(typo.border_cm);
    let strip_height = cm_to_pt(typo.strip_cm);

    let map_area = Rect {
        min: Point::new(border, border),
        max: Point::new(page_width - border, page_height - strip_height),
    };
    let strip = Rect {
        min: Point::new(border, page_height - strip_height),
        max: Point::new(page_width - border, page_height),
    };

    if map_area.width() <= 0.0 || map_area.height() <= 0.0 {
        return Err(LayoutOverflowError {
            field: "map",
            required_pt: border * 2.0 + strip_height,
            available_pt: page_width.min(page_height),
        });
    }

    let logo_reserved = logo.map_or(0.0, |logo| {
        strip_height * typo.logo_height_ratio * logo.aspect_ratio() + cm_to_pt(LOGO_GAP_CM)
    });
    let available = strip.width() - logo_reserved;

    let title = titles.title.trim();
    let subtitle = titles.subtitle.trim().to_uppercase();

    let title_size = fit_size(
        "title",
        title,
        typo.title_font,
        (typo.title_size_pt, typo.min_title_size_pt),
        0.0,
        available,
    )?;
    let subtitle_size = fit_size(
        "subtitle",
        &subtitle,
        typo.subtitle_font,
        (typo.subtitle_size_pt, typo.min_subtitle_size_pt),
        typo.subtitle_tracking_pt,
        available,
    )?;

    let spacing = subtitle_size * typo.line_spacing;
    let block_height = match (title.is_empty(), subtitle.is_empty()) {
        (false, false) => title_size + spacing + subtitle_size,
        (false, true) => title_size,
        (true, false) => subtitle_size,
        (true, true) => 0.0,
    };

    if block_height > strip_height {
        return Err(LayoutOverflowError {
            field: "title_block",
            required_pt: block_height,
            available_pt: strip_height,
        });
    }

    let strip_center = page_height - strip_height / 2.0;
    let block_bottom = strip_center + block_height / 2.0;

    let mut document = Document::new()
        .set("width", format!("{}pt", fixed(page_width)))
        .set("height", format!("{}pt", fixed(page_height)))
        .set(
            "viewBox",
            format!("0 0 {} {}", fixed(page_width), fixed(page_height)),
        )
        .add(
            area(&Rect {
                min: Point::ZERO,
                max: Point::new(page_width, page_height),
            })
            .set("fill", typo.frame_color),
        );

    let map = layer
        .document()
        .clone()
        .set("x", fixed(map_area.min.x))
        .set("y", fixed(map_area.min.y))
        .set("width", fixed(map_area.width()))
        .set("height", fixed(map_area.height()))
        .set("preserveAspectRatio", "xMidYMid slice")
        .set("overflow", "hidden");
    document = document.add(map);

    let mut texts = Vec::new();

    if !subtitle.is_empty() {
        let width = text_width_pt(
            &subtitle,
            typo.subtitle_font,
            subtitle_size,
            typo.subtitle_tracking_pt,
        );

        texts.push(PlacedText {
            x: strip.max.x - width,
            baseline: block_bottom,
            size: subtitle_size,
            font: typo.subtitle_font,
            tracking: typo.subtitle_tracking_pt,
            content: subtitle,
        });
    }

    if !title.is_empty() {
        let width = text_width_pt(title, typo.title_font, title_size, 0.0);
        let baseline = if texts.is_empty() {
            block_bottom
        } else {
            block_bottom - subtitle_size - spacing
        };

        texts.push(PlacedText {
            content: title.to_string(),
            font: typo.title_font,
            x: strip.max.x - width,
            baseline,
            size: title_size,
            tracking: 0.0,
        });
    }

    for placed in &texts {
        document = document.add(text(placed, typo.text_fill));
    }

    let logo = logo.map(|logo| {
        let height = strip_height * typo.logo_height_ratio;
        let placed = Rect {
            min: Point::new(strip.min.x, strip_center - height / 2.0),
            max: Point::new(
                strip.min.x + height * logo.aspect_ratio(),
                strip_center + height / 2.0,
            ),
        };

        (logo.clone(), placed)
    });

    if let Some((logo, placed)) = &logo {
        document = document.add(
            Image::new()
                .set("x", fixed(placed.min.x))
                .set("y", fixed(placed.min.y))
                .set("width", fixed(placed.width()))
                .set("height", fixed(placed.height()))
                .set("href", logo.data_uri()),
        );
    }

    event!(
        Level::DEBUG,
        "Composed {} page: map area {:.1}x{:.1}pt, title {:.1}pt, subtitle {:.1}pt",
        spec.size_key(),
        map_area.width(),
        map_area.height(),
        title_size,
        subtitle_size
    );

    Ok(Composition {
        document,
        layer: layer.clone(),
        spec: spec.clone(),
        style_identity: layer.style_identity().to_string(),
        frame_color: typo.frame_color,
        text_fill: typo.text_fill,
        map_area,
        strip,
        texts,
        logo,
        title_size_pt: title_size,
        subtitle_size_pt: subtitle_size,
    })
}
