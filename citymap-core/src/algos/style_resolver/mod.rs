use crate::{
    constants::{
        CASING_WIDTH_RATIO, DRAW_ORDER, MAX_EXTENT_SCALE, MIN_EXTENT_SCALE, REFERENCE_EXTENT_M,
    },
    error::InvalidStyleError,
    types::{ProductSpec, RoadClass},
};

use serde::Serialize;
use tracing::event;

mod presets;

pub use presets::MapStyle;

/// Type parameters shared by the style and the print composer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Typography {
    pub title_font: &'static str,
    pub subtitle_font: &'static str,
    pub title_size_pt: f64,
    /// The title shrinks down to this size before the layout overflows.
    pub min_title_size_pt: f64,
    pub subtitle_size_pt: f64,
    pub min_subtitle_size_pt: f64,
    /// Extra advance added after every subtitle glyph.
    pub subtitle_tracking_pt: f64,
    /// Gap between title and subtitle, relative to the subtitle size.
    pub line_spacing: f64,
    pub text_fill: &'static str,
    pub frame_color: &'static str,
    pub border_cm: f64,
    pub strip_cm: f64,
    /// Logo height relative to the strip height.
    pub logo_height_ratio: f64,
}

/// A compiled, versioned style. Never loaded at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleConfig {
    pub name: &'static str,
    pub version: u32,
    pub background: &'static str,
    pub blocks: &'static [&'static str],
    pub road: &'static str,
    pub non_vehicular: &'static str,
    pub water_fill: &'static str,
    pub water_edge: &'static str,
    /// Building footprint fill. Styles without one draw no buildings.
    pub buildings: Option<&'static str>,
    /// Outline drawn under vehicular roads, if any.
    pub casing: Option<&'static str>,
    /// Base road width in points.
    pub road_width: f64,
    pub road_boost: f64,
    pub multipliers: &'static [(RoadClass, f64)],
    pub typography: Typography,
}

impl StyleConfig {
    /// `name@version`, used to tag rendered artifacts.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    fn multiplier(&self, class: RoadClass) -> Option<f64> {
        self.multipliers
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, m)| *m)
    }
}

/// Concrete visual parameters for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStyle {
    pub identity: String,
    pub background: &'static str,
    pub blocks: &'static [&'static str],
    pub road: &'static str,
    pub non_vehicular: &'static str,
    pub water_fill: &'static str,
    pub water_edge: &'static str,
    pub buildings: Option<&'static str>,
    pub casing: Option<&'static str>,
    pub extent_scale: f64,
    widths_pt: [(RoadClass, f64); 5],
    pub typography: Typography,
}

impl ResolvedStyle {
    /// Scaled stroke width of `class` in points.
    pub fn width_pt(&self, class: RoadClass) -> f64 {
        self.widths_pt
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, w)| *w)
            .unwrap_or_default()
    }

    /// Width of the casing under `class`, zero where none is drawn.
    pub fn casing_width_pt(&self, class: RoadClass) -> f64 {
        match self.casing {
            Some(_) if class.is_vehicular() => self.width_pt(class) * CASING_WIDTH_RATIO,
            _ => 0.0,
        }
    }

    pub fn road_color(&self, class: RoadClass) -> &'static str {
        if class.is_vehicular() {
            self.road
        } else {
            self.non_vehicular
        }
    }

    /// Road classes bottom first.
    pub fn draw_order(&self) -> &'static [RoadClass] {
        &DRAW_ORDER
    }

    /// Palette entry `slot`, wrapping around.
    pub fn block_color(&self, slot: usize) -> &'static str {
        self.blocks[slot % self.blocks.len()]
    }
}

/// Line thinning applied to every road class: `REFERENCE_EXTENT_M / extent_m`, clamped.
///
/// Continuous and non-increasing in `extent_m`.
pub fn extent_scale_factor(extent_m: f64) -> f64 {
    if extent_m <= 0.0 || !extent_m.is_finite() {
        return MAX_EXTENT_SCALE;
    }

    (REFERENCE_EXTENT_M / extent_m).clamp(MIN_EXTENT_SCALE, MAX_EXTENT_SCALE)
}

fn is_hex_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };

    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

fn check_color(
    config: &StyleConfig,
    field: &'static str,
    value: &'static str,
) -> Result<&'static str, InvalidStyleError> {
    if value.trim().is_empty() {
        return Err(InvalidStyleError::MissingColor {
            style: config.name.to_string(),
            field,
        });
    }

    if !is_hex_color(value) {
        return Err(InvalidStyleError::InvalidColor {
            style: config.name.to_string(),
            field,
            value: value.to_string(),
        });
    }

    Ok(value)
}

fn check_positive(config: &StyleConfig, field: &'static str, value: f64) -> Result<f64, InvalidStyleError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(InvalidStyleError::InvalidValue {
            style: config.name.to_string(),
            field,
            value,
        })
    }
}

/// Resolves per-class widths and colors for one product. Pure.
pub fn resolve_style(
    config: &StyleConfig,
    spec: &ProductSpec,
) -> Result<ResolvedStyle, InvalidStyleError> {
    let background = check_color(config, "background", config.background)?;
    let road = check_color(config, "road", config.road)?;
    let non_vehicular = check_color(config, "non_vehicular", config.non_vehicular)?;
    let water_fill = check_color(config, "water_fill", config.water_fill)?;
    let water_edge = check_color(config, "water_edge", config.water_edge)?;
    let buildings = config
        .buildings
        .map(|color| check_color(config, "buildings", color))
        .transpose()?;
    let casing = config
        .casing
        .map(|color| check_color(config, "casing", color))
        .transpose()?;

    if config.blocks.is_empty() {
        return Err(InvalidStyleError::EmptyPalette {
            style: config.name.to_string(),
        });
    }
    for block in config.blocks {
        check_color(config, "blocks", block)?;
    }

    let typography = &config.typography;
    check_color(config, "text_fill", typography.text_fill)?;
    check_color(config, "frame_color", typography.frame_color)?;
    check_positive(config, "title_size_pt", typography.title_size_pt)?;
    check_positive(config, "min_title_size_pt", typography.min_title_size_pt)?;
    check_positive(config, "subtitle_size_pt", typography.subtitle_size_pt)?;
    check_positive(config, "min_subtitle_size_pt", typography.min_subtitle_size_pt)?;
    check_positive(config, "strip_cm", typography.strip_cm)?;

    let base = config.road_width + config.road_boost;
    check_positive(config, "road_width", base)?;

    let extent_scale = extent_scale_factor(spec.extent_m());

    let mut widths_pt = [(RoadClass::Local, 0.0); 5];
    for (slot, class) in widths_pt.iter_mut().zip(RoadClass::ALL) {
        let multiplier =
            config
                .multiplier(class)
                .ok_or_else(|| InvalidStyleError::MissingMultiplier {
                    style: config.name.to_string(),
                    class,
                })?;

        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(InvalidStyleError::InvalidMultiplier {
                style: config.name.to_string(),
                class,
                value: multiplier,
            });
        }

        *slot = (class, base * multiplier * extent_scale);
    }

    event!(
        tracing::Level::DEBUG,
        "Resolved style {} for extent {}m (scale {:.3})",
        config.identity(),
        spec.extent_m(),
        extent_scale
    );

    Ok(ResolvedStyle {
        identity: config.identity(),
        background,
        blocks: config.blocks,
        road,
        non_vehicular,
        water_fill,
        water_edge,
        buildings,
        casing,
        extent_scale,
        widths_pt,
        typography: config.typography,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn spec(extent_m: f64) -> ProductSpec {
        ProductSpec::new(50.0, 70.0, extent_m, 300)
    }

    #[test]
    fn scale_factor_is_pinned() {
        assert_eq!(extent_scale_factor(2000.0), 1.0);
        assert_eq!(extent_scale_factor(1000.0), 2.0);
        assert_eq!(extent_scale_factor(5000.0), 0.4);
        assert_eq!(extent_scale_factor(100.0), 3.0);
        assert_eq!(extent_scale_factor(50_000.0), 0.15);
    }

    #[test]
    fn widths_follow_the_three_factor_model() {
        let style = resolve_style(MapStyle::Warm.config(), &spec(3000.0)).unwrap();

        let expected = 1.2 * 2.4 * (2000.0 / 3000.0);
        assert!((style.width_pt(RoadClass::Motorway) - expected).abs() < 1e-12);
        assert_eq!(style.identity, "warm@1");
    }

    #[test]
    fn widths_never_grow_with_extent() {
        let extents = [100.0, 500.0, 1000.0, 1999.0, 2000.0, 2001.0, 5000.0, 13_333.0, 40_000.0];

        for style in MapStyle::ALL {
            for pair in extents.windows(2) {
                let near = resolve_style(style.config(), &spec(pair[0])).unwrap();
                let far = resolve_style(style.config(), &spec(pair[1])).unwrap();

                for class in RoadClass::ALL {
                    assert!(near.width_pt(class) >= far.width_pt(class));
                }
            }
        }
    }

    #[test]
    fn higher_classes_are_wider() {
        for style in MapStyle::ALL {
            let resolved = resolve_style(style.config(), &spec(3000.0)).unwrap();
            let widths = resolved
                .draw_order()
                .iter()
                .map(|class| resolved.width_pt(*class))
                .collect::<Vec<_>>();

            assert!(widths.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(resolved.draw_order().last(), Some(&RoadClass::Motorway));
        }
    }

    #[test]
    fn missing_multiplier_is_rejected() {
        let config = StyleConfig {
            multipliers: &[
                (RoadClass::Motorway, 2.0),
                (RoadClass::Local, 1.0),
                (RoadClass::Minor, 0.5),
                (RoadClass::NonVehicular, 0.3),
            ],
            ..MapStyle::Warm.config().clone()
        };

        assert_eq!(
            resolve_style(&config, &spec(3000.0)),
            Err(InvalidStyleError::MissingMultiplier {
                style: "warm".to_string(),
                class: RoadClass::Arterial,
            })
        );
    }

    #[test]
    fn missing_or_invalid_colors_are_rejected() {
        let config = StyleConfig {
            road: "",
            ..MapStyle::Warm.config().clone()
        };
        assert_eq!(
            resolve_style(&config, &spec(3000.0)),
            Err(InvalidStyleError::MissingColor {
                style: "warm".to_string(),
                field: "road",
            })
        );

        let config = StyleConfig {
            water_fill: "teal",
            ..MapStyle::Warm.config().clone()
        };
        assert!(matches!(
            resolve_style(&config, &spec(3000.0)),
            Err(InvalidStyleError::InvalidColor {
                field: "water_fill",
                ..
            })
        ));

        let config = StyleConfig {
            blocks: &[],
            ..MapStyle::Warm.config().clone()
        };
        assert!(matches!(
            resolve_style(&config, &spec(3000.0)),
            Err(InvalidStyleError::EmptyPalette { .. })
        ));
    }

    #[test]
    fn casing_is_wider_than_its_road_and_skips_paths() {
        let style = resolve_style(MapStyle::WhiteMinimal.config(), &spec(3000.0)).unwrap();

        for class in RoadClass::ALL {
            if class.is_vehicular() {
                assert!(style.casing_width_pt(class) > style.width_pt(class));
            } else {
                assert_eq!(style.casing_width_pt(class), 0.0);
            }
        }

        let warm = resolve_style(MapStyle::Warm.config(), &spec(3000.0)).unwrap();
        assert_eq!(warm.casing_width_pt(RoadClass::Motorway), 0.0);
        assert_eq!(warm.buildings, None);

        let config = StyleConfig {
            buildings: Some("grey"),
            ..MapStyle::WhiteMinimal.config().clone()
        };
        assert!(matches!(
            resolve_style(&config, &spec(3000.0)),
            Err(InvalidStyleError::InvalidColor {
                field: "buildings",
                ..
            })
        ));
    }

    #[test]
    fn block_colors_wrap_around_the_palette() {
        let style = resolve_style(MapStyle::Warm.config(), &spec(3000.0)).unwrap();

        assert_eq!(style.block_color(0), style.block_color(7));
        assert_eq!(style.block_color(3), "#e39f55");
    }
}
