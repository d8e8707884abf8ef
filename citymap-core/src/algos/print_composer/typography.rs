use crate::{error::LayoutOverflowError, types::GeoPoint};

// Advance widths of the standard Helvetica faces for ' ' ..= '~', in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' - '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0' - '?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@' - 'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P' - '_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`' - 'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p' - '~'
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' ' - '/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0' - '?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@' - 'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P' - '_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`' - 'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p' - '~'
];

fn metrics(font: &str) -> &'static [u16; 95] {
    if font.ends_with("Bold") {
        &HELVETICA_BOLD
    } else {
        &HELVETICA
    }
}

fn advance(table: &[u16; 95], c: char) -> u16 {
    match c {
        ' '..='~' => table[c as usize - ' ' as usize],
        // Degree, prime and double prime of coordinate subtitles.
        '°' => 400,
        '′' => 191,
        '″' => 355,
        // Everything else is measured like the lower-case 'o' of the face.
        _ => table['o' as usize - ' ' as usize],
    }
}

/// Width of `text` set in `font` at `size_pt`, with `tracking_pt` added between glyphs.
pub(crate) fn text_width_pt(text: &str, font: &str, size_pt: f64, tracking_pt: f64) -> f64 {
    let table = metrics(font);
    let units = text.chars().map(|c| advance(table, c) as f64).sum::<f64>();
    let gaps = text.chars().count().saturating_sub(1) as f64;

    units * size_pt / 1000.0 + gaps * tracking_pt
}

/// Largest size in `[min_pt, nominal_pt]` at which `text` fits into `available_pt`.
pub(crate) fn fit_size(
    field: &'static str,
    text: &str,
    font: &str,
    (nominal_pt, min_pt): (f64, f64),
    tracking_pt: f64,
    available_pt: f64,
) -> Result<f64, LayoutOverflowError> {
    if text_width_pt(text, font, nominal_pt, tracking_pt) <= available_pt {
        return Ok(nominal_pt);
    }

    let at_one_pt = text_width_pt(text, font, 1.0, 0.0);
    if at_one_pt <= 0.0 {
        return Ok(min_pt);
    }
    let gaps = text.chars().count().saturating_sub(1) as f64;
    let size = ((available_pt - gaps * tracking_pt) / at_one_pt * 100.0).floor() / 100.0;

    if size >= min_pt {
        Ok(size)
    } else {
        Err(LayoutOverflowError {
            field,
            required_pt: text_width_pt(text, font, min_pt, tracking_pt),
            available_pt,
        })
    }
}

fn dms(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value >= 0.0 { positive } else { negative };

    // Whole seconds, carried into minutes and degrees.
    let total = (value.abs() * 3600.0).round() as u64;
    let (degrees, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);

    format!("{degrees}°{minutes:02}′{seconds:02}″{hemisphere}")
}

/// Formats a coordinate as degrees, minutes and seconds, e.g. `47°29′52″N 19°02′25″E`.
pub fn to_dms(point: GeoPoint) -> String {
    format!(
        "{} {}",
        dms(point.lat, 'N', 'S'),
        dms(point.lon, 'E', 'W')
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn widths_follow_the_font_metrics() {
        // H e l v e t i c a
        let expected = (722 + 556 + 222 + 500 + 556 + 278 + 222 + 500 + 556) as f64 * 0.048;
        assert!((text_width_pt("Helvetica", "Helvetica", 48.0, 0.0) - expected).abs() < 1e-9);

        let plain = text_width_pt("BUDAPEST", "Helvetica", 17.0, 0.0);
        let bold = text_width_pt("BUDAPEST", "Helvetica-Bold", 17.0, 0.0);
        assert!(bold > plain);

        let tracked = text_width_pt("BUDAPEST", "Helvetica-Bold", 17.0, 1.5);
        assert!((tracked - bold - 7.0 * 1.5).abs() < 1e-9);
        assert_eq!(text_width_pt("", "Helvetica", 17.0, 1.5), 0.0);
    }

    #[test]
    fn titles_shrink_before_overflowing() {
        let nominal = fit_size("title", "Budapest", "Helvetica", (48.0, 24.0), 0.0, 1000.0);
        assert_eq!(nominal, Ok(48.0));

        let width = text_width_pt("Budapest", "Helvetica", 48.0, 0.0);
        let shrunk =
            fit_size("title", "Budapest", "Helvetica", (48.0, 24.0), 0.0, width * 0.75).unwrap();
        assert!(shrunk < 48.0 && shrunk >= 24.0);
        assert!(text_width_pt("Budapest", "Helvetica", shrunk, 0.0) <= width * 0.75);

        let err = fit_size("title", "Budapest", "Helvetica", (48.0, 24.0), 0.0, width * 0.25)
            .unwrap_err();
        assert_eq!(err.field, "title");
        assert!(err.required_pt > err.available_pt);
    }

    #[test]
    fn empty_text_takes_the_minimum_size_anywhere() {
        assert_eq!(
            fit_size("subtitle", "", "Helvetica-Bold", (17.0, 9.0), 1.5, 40.0),
            Ok(17.0)
        );
        for available in [-0.5, -12.0] {
            assert_eq!(
                fit_size("subtitle", "", "Helvetica-Bold", (17.0, 9.0), 1.5, available),
                Ok(9.0)
            );
        }

        let err = fit_size("title", "Pécs", "Helvetica", (48.0, 24.0), 0.0, -5.0).unwrap_err();
        assert_eq!(err.field, "title");
    }

    #[test]
    fn coordinates_in_dms() {
        assert_eq!(
            to_dms(GeoPoint::new(47.4979, 19.0402)),
            "47°29′52″N 19°02′25″E"
        );
        assert_eq!(
            to_dms(GeoPoint::new(51.4925, -0.3175)),
            "51°29′33″N 0°19′03″W"
        );
        // 59.9999 minutes round up into the next degree.
        assert_eq!(to_dms(GeoPoint::new(-33.99999, 0.0)), "34°00′00″S 0°00′00″E");
    }
}
