mod geometry_processor;
mod map_drawer;
mod print_composer;
mod size_resolver;
mod style_resolver;

pub use geometry_processor::{ExtractOptions, ExtractedGeometry, extract};
pub use map_drawer::{RenderedLayer, render};
pub use print_composer::{Composition, Logo, TitleBlock, compose, to_dms};
pub use size_resolver::{SizeRequest, SizeSource, resolve_size, size_keys};
pub use style_resolver::{
    MapStyle, ResolvedStyle, StyleConfig, Typography, extent_scale_factor, resolve_style,
};
