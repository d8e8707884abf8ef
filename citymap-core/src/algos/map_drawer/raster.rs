use crate::error::RenderError;

use std::sync::{Arc, OnceLock};

use tiny_skia::{Pixmap, Transform};
use usvg::fontdb;

// Shared by every rasterization in the process.
fn system_fonts() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            Arc::new(db)
        })
        .clone()
}

/// Rasterizes an SVG document into a `width` x `height` pixmap, scaling it to fit.
pub(crate) fn rasterize(
    svg: &str,
    width: u32,
    height: u32,
    with_text: bool,
) -> Result<Pixmap, RenderError> {
    let mut options = usvg::Options::default();
    if with_text {
        options.fontdb = system_fonts();
    }

    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| RenderError::Parse(e.to_string()))?;

    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;

    let size = tree.size();
    let transform = Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    Ok(pixmap)
}

pub(crate) fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    pixmap
        .encode_png()
        .map_err(|e| RenderError::Encode(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"><rect x="0" y="0" width="10" height="10" fill="#ff0000"/></svg>"##;

    #[test]
    fn documents_are_scaled_to_the_requested_size() {
        let pixmap = rasterize(SQUARE, 40, 40, false).unwrap();

        assert_eq!((pixmap.width(), pixmap.height()), (40, 40));

        let pixel = pixmap.pixel(39, 39).unwrap();
        assert_eq!((pixel.red(), pixel.green(), pixel.blue()), (255, 0, 0));
    }

    #[test]
    fn broken_documents_and_empty_rasters_are_errors() {
        assert!(matches!(
            rasterize("<svg", 10, 10, false),
            Err(RenderError::Parse(_))
        ));
        assert_eq!(
            rasterize(SQUARE, 0, 10, false).unwrap_err(),
            RenderError::Allocation {
                width: 0,
                height: 10
            }
        );
    }
}
