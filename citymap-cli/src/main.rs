use citymap_core::{
    CitymapRequest, GeoPoint, Logo, MapStyle, SizeRequest, SizeSource, TitleBlock,
    create_citymap, size_keys,
    source::{CachedSource, PbfSource},
};

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use svg::save as save_as_svg;

#[derive(Parser, Debug)]
#[command(version, about = "Render print-ready city maps", long_about = None)]
struct Args {
    /// Latitude of the map center, in degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude of the map center, in degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// Product sizes to render, either a known key such as `50x70` or free `WIDTHxHEIGHT`
    /// centimeters. May be repeated
    #[arg(short = 'k', long = "size-key")]
    size_keys: Vec<String>,

    /// Render every known product size
    #[arg(long, conflicts_with_all = ["size_keys", "width_cm"])]
    all_sizes: bool,

    /// Explicit print width in centimeters
    #[arg(long, requires = "height_cm", conflicts_with = "size_keys")]
    width_cm: Option<f64>,

    /// Explicit print height in centimeters
    #[arg(long, requires = "width_cm")]
    height_cm: Option<f64>,

    /// Half of the map height on the ground, in meters
    #[arg(short, long, default_value_t = 3000.0)]
    extent_m: f64,

    /// Output resolution
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    #[arg(short, long, default_value_t, value_enum)]
    style: MapStyle,

    /// Seed for the block palette
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Title printed under the map
    #[arg(short, long, default_value = "")]
    title: String,

    /// Subtitle printed under the title. Defaults to the center coordinates
    #[arg(long)]
    subtitle: Option<String>,

    /// PNG logo placed at the left of the title strip
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Also draw footways, paths and cycleways
    #[arg(long)]
    include_non_vehicular: bool,

    /// Leave building footprints out of the styles that draw them
    #[arg(long)]
    no_buildings: bool,

    /// Local `.osm.pbf` extract to read roads and water from
    #[arg(long)]
    osm_pbf: PathBuf,

    #[arg(short, long, default_value = "generated")]
    output_dir: PathBuf,

    /// Also write a PNG next to every SVG and PDF
    #[arg(long)]
    png: bool,

    /// Log pipeline timings
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn size_requests(&self) -> Vec<SizeRequest> {
        let sizes: Vec<SizeRequest> = if self.all_sizes {
            size_keys().map(SizeRequest::from_key).collect()
        } else if let (Some(width), Some(height)) = (self.width_cm, self.height_cm) {
            vec![SizeRequest::explicit(width, height)]
        } else if self.size_keys.is_empty() {
            vec![SizeRequest::from_key("50x70")]
        } else {
            self.size_keys
                .iter()
                .map(|key| {
                    if size_keys().any(|known| known == key.trim()) {
                        SizeRequest::from_key(key.trim())
                    } else {
                        SizeRequest::from_dimensions(key.as_str())
                    }
                })
                .collect()
        };

        sizes
            .into_iter()
            .map(|size| size.with_extent(self.extent_m).with_dpi(self.dpi))
            .collect()
    }

    fn request(&self, size: SizeRequest, titles: &TitleBlock, logo: Option<&Logo>) -> CitymapRequest {
        CitymapRequest {
            style: self.style,
            seed: self.seed,
            include_non_vehicular: self.include_non_vehicular,
            buildings: !self.no_buildings,
            titles: titles.clone(),
            logo: logo.cloned(),
            ..CitymapRequest::new(GeoPoint::new(self.lat, self.lon), size)
        }
    }

    fn titles(&self) -> TitleBlock {
        let center = GeoPoint::new(self.lat, self.lon);
        match &self.subtitle {
            Some(subtitle) => TitleBlock::new(self.title.as_str(), subtitle.as_str()),
            None => TitleBlock::with_coordinates(self.title.as_str(), center),
        }
    }
}

fn size_label(request: &SizeRequest) -> String {
    match &request.size {
        SizeSource::Explicit {
            width_cm,
            height_cm,
        } => format!("{}x{}", width_cm, height_cm),
        SizeSource::Key(key) | SizeSource::Dimensions(key) => key.clone(),
    }
}

fn load_logo(path: &Path) -> Result<Logo> {
    let png = fs::read(path).with_context(|| format!("failed to read logo {}", path.display()))?;
    Logo::from_png(png).with_context(|| format!("{} is not a usable PNG", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    anyhow::ensure!(
        args.osm_pbf.is_file(),
        "OSM extract {} does not exist",
        args.osm_pbf.display()
    );

    let logo = args.logo.as_deref().map(load_logo).transpose()?;
    let titles = args.titles();
    let source = CachedSource::new(PbfSource::new(&args.osm_pbf));

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let written = args
        .size_requests()
        .into_par_iter()
        .map(|size| -> Result<PathBuf> {
            let label = size_label(&size);
            let request = args.request(size, &titles, logo.as_ref());

            let output = create_citymap(&request, &source)
                .with_context(|| format!("failed to render size {}", label))?;

            if !output.warnings.is_empty() {
                tracing::info!("{}: dropped {} polygons", label, output.warnings.len());
            }

            let composition = &output.composition;
            let svg_path = args
                .output_dir
                .join(composition.file_name(&timestamp, "svg"));
            save_as_svg(&svg_path, composition.document())
                .with_context(|| format!("failed to save {}", svg_path.display()))?;
            tracing::info!("Saved map as SVG to: {}", svg_path.display());

            let pdf_path = args
                .output_dir
                .join(composition.file_name(&timestamp, "pdf"));
            let pdf = composition
                .to_pdf()
                .with_context(|| format!("failed to write the PDF for size {}", label))?;
            fs::write(&pdf_path, pdf)
                .with_context(|| format!("failed to save {}", pdf_path.display()))?;
            tracing::info!("Saved map as PDF to: {}", pdf_path.display());

            if args.png {
                let png_path = args
                    .output_dir
                    .join(composition.file_name(&timestamp, "png"));
                let png = composition
                    .to_png()
                    .with_context(|| format!("failed to rasterize size {}", label))?;
                fs::write(&png_path, png)
                    .with_context(|| format!("failed to save {}", png_path.display()))?;
                tracing::info!("Saved map as PNG to: {}", png_path.display());
            }

            Ok(svg_path)
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::info!("Rendered {} map(s)", written.len());

    Ok(())
}
