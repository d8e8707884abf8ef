use super::{StyleConfig, Typography};
use crate::{
    constants::{BORDER_CM, STRIP_CM},
    types::RoadClass,
};

use serde::Serialize;

const PRESET_VERSION: u32 = 1;

const WATER_TEAL: &str = "#5BA29D";
const WATER_LIGHT_BLUE: &str = "#a9c9d8";

const DEFAULT_MULTIPLIERS: &[(RoadClass, f64)] = &[
    (RoadClass::NonVehicular, 0.4),
    (RoadClass::Minor, 0.6),
    (RoadClass::Local, 1.0),
    (RoadClass::Arterial, 1.6),
    (RoadClass::Motorway, 2.4),
];

const MINIMAL_MULTIPLIERS: &[(RoadClass, f64)] = &[
    (RoadClass::NonVehicular, 0.45),
    (RoadClass::Minor, 0.7),
    (RoadClass::Local, 1.0),
    (RoadClass::Arterial, 1.8),
    (RoadClass::Motorway, 2.8),
];

const DEFAULT_TYPOGRAPHY: Typography = Typography {
    title_font: "Helvetica",
    subtitle_font: "Helvetica-Bold",
    title_size_pt: 48.0,
    min_title_size_pt: 24.0,
    subtitle_size_pt: 17.0,
    min_subtitle_size_pt: 10.0,
    subtitle_tracking_pt: 1.5,
    line_spacing: 0.3,
    text_fill: "#4E4E4E",
    frame_color: "#D9D5C7",
    border_cm: BORDER_CM,
    strip_cm: STRIP_CM,
    logo_height_ratio: 0.5,
};

const WARM: StyleConfig = StyleConfig {
    name: "warm",
    version: PRESET_VERSION,
    background: "#e6e0cf",
    blocks: &[
        "#e28c41", "#cd6d40", "#e7b573", "#e39f55", "#c86a3d", "#b55a3a", "#9b4d37",
    ],
    road: "#ffffff",
    non_vehicular: "#f3ede0",
    water_fill: WATER_TEAL,
    water_edge: WATER_TEAL,
    buildings: None,
    casing: None,
    road_width: 1.2,
    road_boost: 0.0,
    multipliers: DEFAULT_MULTIPLIERS,
    typography: DEFAULT_TYPOGRAPHY,
};

const URBAN_MODERN: StyleConfig = StyleConfig {
    name: "urban_modern",
    version: PRESET_VERSION,
    background: "#d9d5c7",
    blocks: &[
        "#E8891C", "#D26A1E", "#C65A2A", "#E2C79F", "#F0A21A", "#7C7368", "#2F2F2F",
    ],
    road: "#ffffff",
    non_vehicular: "#f3ede0",
    water_fill: WATER_TEAL,
    water_edge: WATER_TEAL,
    buildings: None,
    casing: None,
    road_width: 1.2,
    road_boost: 0.0,
    multipliers: DEFAULT_MULTIPLIERS,
    typography: DEFAULT_TYPOGRAPHY,
};

const AMBER_DISTRICT: StyleConfig = StyleConfig {
    name: "amber_district",
    version: PRESET_VERSION,
    background: "#e8e2d2",
    blocks: &[
        "#2f2f33", "#4a4a4a", "#8c7a5b", "#b89b5e", "#d4b35f", "#e2cfa4", "#c76a3a",
    ],
    road: "#ffffff",
    non_vehicular: "#f3ede0",
    water_fill: WATER_TEAL,
    water_edge: WATER_TEAL,
    buildings: None,
    casing: None,
    road_width: 1.2,
    road_boost: 0.0,
    multipliers: DEFAULT_MULTIPLIERS,
    typography: DEFAULT_TYPOGRAPHY,
};

const WHITE_MINIMAL: StyleConfig = StyleConfig {
    name: "white_minimal",
    version: PRESET_VERSION,
    background: "#f8f8f8",
    blocks: &["#ffffff"; 7],
    road: "#2a2a2a",
    non_vehicular: "#8a8a8a",
    water_fill: WATER_LIGHT_BLUE,
    water_edge: WATER_LIGHT_BLUE,
    buildings: Some("#e4e4e4"),
    casing: Some("#ffffff"),
    road_width: 1.3,
    road_boost: 0.0,
    multipliers: MINIMAL_MULTIPLIERS,
    typography: DEFAULT_TYPOGRAPHY,
};

const BLACK_MINIMAL: StyleConfig = StyleConfig {
    name: "black_minimal",
    version: PRESET_VERSION,
    background: "#000000",
    blocks: &["#000000"; 7],
    road: "#ffffff",
    non_vehicular: "#7a7a7a",
    water_fill: WATER_LIGHT_BLUE,
    water_edge: WATER_LIGHT_BLUE,
    buildings: Some("#1c1c1c"),
    casing: Some("#000000"),
    road_width: 1.3,
    road_boost: 0.0,
    multipliers: MINIMAL_MULTIPLIERS,
    typography: DEFAULT_TYPOGRAPHY,
};

#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[cfg_attr(feature = "style-ord-hash", derive(PartialOrd, Ord, Hash))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStyle {
    #[default]
    Warm,
    UrbanModern,
    AmberDistrict,
    WhiteMinimal,
    BlackMinimal,
}

impl MapStyle {
    pub const ALL: [MapStyle; 5] = [
        MapStyle::Warm,
        MapStyle::UrbanModern,
        MapStyle::AmberDistrict,
        MapStyle::WhiteMinimal,
        MapStyle::BlackMinimal,
    ];

    /// The compiled configuration behind this style.
    pub fn config(&self) -> &'static StyleConfig {
        match self {
            MapStyle::Warm => &WARM,
            MapStyle::UrbanModern => &URBAN_MODERN,
            MapStyle::AmberDistrict => &AMBER_DISTRICT,
            MapStyle::WhiteMinimal => &WHITE_MINIMAL,
            MapStyle::BlackMinimal => &BLACK_MINIMAL,
        }
    }
}

#[cfg(feature = "style-try-from-str")]
impl MapStyle {
    pub fn try_from_str(style: &str) -> anyhow::Result<Self> {
        Ok(match style.trim().replace('-', "_").as_str() {
            "warm" => MapStyle::Warm,
            "urban_modern" => MapStyle::UrbanModern,
            "amber_district" => MapStyle::AmberDistrict,
            "white_minimal" => MapStyle::WhiteMinimal,
            "black_minimal" => MapStyle::BlackMinimal,
            _ => return Err(anyhow::anyhow!(r#"Unknown map style: "{}""#, style)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn presets_are_distinct_and_complete() {
        let names = MapStyle::ALL
            .iter()
            .map(|style| style.config().name)
            .collect::<Vec<_>>();

        assert_eq!(
            names,
            [
                "warm",
                "urban_modern",
                "amber_district",
                "white_minimal",
                "black_minimal"
            ]
        );

        for style in MapStyle::ALL {
            let config = style.config();
            assert_eq!(config.blocks.len(), 7);
            assert_eq!(config.multipliers.len(), RoadClass::ALL.len());
        }
    }

    #[cfg(feature = "style-try-from-str")]
    #[test]
    fn styles_parse_from_either_separator() {
        assert_eq!(
            MapStyle::try_from_str("urban-modern").unwrap(),
            MapStyle::UrbanModern
        );
        assert_eq!(
            MapStyle::try_from_str("black_minimal").unwrap(),
            MapStyle::BlackMinimal
        );
        assert!(MapStyle::try_from_str("sepia").is_err());
    }
}
