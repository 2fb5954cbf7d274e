//! roiscope command-line interface.
//!
//! Imports segmentation output, links cells, applies the border rule and
//! renders overlays, neighbor statistics, measurement tables or the ROI
//! export layout.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

mod input;

use clap::{Args, Parser, Subcommand, ValueEnum};
use input::{ImageInfo, SegmentationFile};
use roiscope_algorithms::{NeighborConfig, NeighborSearch};
use roiscope_core::{Category, DisplaySettings, Point, RegionSet, RegionStore};
use roiscope_io::{
    collect_rows, plan_image_export, plan_master_archive, sanitize_file_name, MeasurementWriter,
};
use roiscope_render::{
    raster, RenderConfig, RenderMode, RenderOutcome, RenderingEngine, ViewTransform,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    RoiscopeIo(#[from] roiscope_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] roiscope_core::Error),

    #[error("Render error: {0}")]
    Render(#[from] roiscope_render::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Overlay drawing strategy.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Category fill and outline of every shape
    Full,
    /// Bounding rectangles grouped by color
    Batch,
    /// Outlines in one fixed color
    UltraFast,
}

impl From<Mode> for RenderMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Full => RenderMode::Full,
            Mode::Batch => RenderMode::Batch,
            Mode::UltraFast => RenderMode::UltraFast,
        }
    }
}

/// Measurement table format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

/// Region overlays and measurements for segmented histopathology images.
#[derive(Parser)]
#[command(name = "roiscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads segmentation input.
#[derive(Args)]
struct InputArgs {
    /// Segmentation JSON file
    #[arg(short, long)]
    input: PathBuf,

    /// Display settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Ignore regions closer than this to the image edge (pixels)
    #[arg(long)]
    border_distance: Option<i32>,
}

/// View transform options.
#[derive(Args)]
struct ViewArgs {
    #[arg(long, default_value = "1.0")]
    scale_x: f64,

    #[arg(long, default_value = "1.0")]
    scale_y: f64,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    offset_x: f64,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    offset_y: f64,
}

impl ViewArgs {
    fn transform(&self) -> Result<ViewTransform> {
        Ok(ViewTransform::new(self.scale_x, self.scale_y, self.offset_x, self.offset_y)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render region overlays to PNG
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Output PNG (a directory when several images are rendered)
        #[arg(short, long)]
        output: PathBuf,

        /// Only render this image
        #[arg(long)]
        image: Option<String>,

        /// Drawing strategy
        #[arg(short, long, value_enum, default_value = "full")]
        mode: Mode,

        #[command(flatten)]
        view: ViewArgs,

        /// Draw ignored regions too
        #[arg(long)]
        show_ignored: bool,

        /// Draw straight onto the output, bypassing the overlay buffer
        #[arg(long)]
        direct: bool,
    },

    /// Print region counts and neighbor statistics
    Stats {
        #[command(flatten)]
        input: InputArgs,

        /// Neighbor search radius (pixels)
        #[arg(long, default_value = "50.0")]
        radius: f64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write a per-region measurement table
    Measure {
        #[command(flatten)]
        input: InputArgs,

        /// Output table
        #[arg(short, long)]
        output: PathBuf,

        /// Table format (defaults to the output extension)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Keep regions flagged as ignored
        #[arg(long)]
        include_ignored: bool,

        /// Neighbor search radius (pixels)
        #[arg(long, default_value = "50.0")]
        radius: f64,
    },

    /// Print the ROI archive layout an export would produce
    ExportPlan {
        #[command(flatten)]
        input: InputArgs,

        /// Plan a single image instead of the master archive
        #[arg(long)]
        image: Option<String>,

        /// Master archive file name
        #[arg(long, default_value = "All_ROIs.zip")]
        archive: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the topmost visible region under a screen point
    Pick {
        #[command(flatten)]
        input: InputArgs,

        /// Image to search
        #[arg(long)]
        image: String,

        #[arg(long, allow_hyphen_values = true)]
        x: f64,

        #[arg(long, allow_hyphen_values = true)]
        y: f64,

        #[command(flatten)]
        view: ViewArgs,
    },
}

struct Loaded {
    store: RegionStore,
    images: Vec<ImageInfo>,
    settings: DisplaySettings,
}

impl InputArgs {
    fn load(&self) -> Result<Loaded> {
        let mut settings = match &self.settings {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                let settings: DisplaySettings = serde_json::from_reader(std::io::BufReader::new(file))?;
                settings.validate()?;
                settings
            }
            None => DisplaySettings::default(),
        };
        if let Some(distance) = self.border_distance {
            settings.ignore = settings.ignore.clone().with_border_distance(distance);
        }
        let (store, images) = SegmentationFile::open(&self.input)?.load(settings.ignore.border_distance)?;
        Ok(Loaded {
            store,
            images,
            settings,
        })
    }
}

impl Loaded {
    fn set(&self, image: &str) -> Result<Arc<RegionSet>> {
        self.store
            .snapshot(image)
            .ok_or_else(|| CliError::InvalidInput(format!("no image named '{image}'")))
    }

    fn info(&self, image: &str) -> Result<&ImageInfo> {
        self.images
            .iter()
            .find(|i| i.image == image)
            .ok_or_else(|| CliError::InvalidInput(format!("no image named '{image}'")))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Render {
            input,
            output,
            image,
            mode,
            view,
            show_ignored,
            direct,
        } => {
            let mut loaded = input.load()?;
            if show_ignored {
                loaded.settings.ignore.show_ignored = true;
            }
            let transform = view.transform()?;
            let targets: Vec<ImageInfo> = match &image {
                Some(name) => vec![loaded.info(name)?.clone()],
                None => loaded.images.clone(),
            };
            if targets.len() > 1 {
                std::fs::create_dir_all(&output)?;
            }

            let mut engine = RenderingEngine::new(RenderConfig::default(), loaded.settings.clone());
            engine.set_mode(mode.into());
            let start = Instant::now();
            for info in &targets {
                let set = loaded.set(&info.image)?;
                let (width, height) = transform.display_size(info.width, info.height);
                let mut canvas = raster::try_canvas(width, height)?;

                if direct {
                    let stats = engine.render_directly(&mut canvas, set.regions(), &transform);
                    log::info!("'{}': drew {} regions directly", info.image, stats.drawn);
                } else {
                    match engine.render(&set, info.width, info.height) {
                        RenderOutcome::Rendered(stats) => log::info!(
                            "'{}': drew {} regions ({} hidden, {} degraded) in {:.2?}",
                            info.image,
                            stats.drawn,
                            stats.hidden,
                            stats.degraded,
                            stats.elapsed
                        ),
                        RenderOutcome::Skipped => log::debug!("'{}': buffer reused", info.image),
                        RenderOutcome::Unavailable => {
                            return Err(CliError::InvalidInput(format!(
                                "image '{}' is too large to buffer",
                                info.image
                            )))
                        }
                    }
                    engine.copy_to_viewport(&mut canvas, &transform);
                }

                let path = output_path(&output, &info.image, targets.len() > 1);
                canvas.save(&path)?;
                println!("{} -> {}", info.image, path.display());
            }
            println!(
                "Rendered {} images in {:.2}s",
                targets.len(),
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Stats { input, radius, json } => {
            let loaded = input.load()?;
            let search = NeighborSearch::new(NeighborConfig::default().with_radius(radius))?;
            let stats = loaded.store.statistics();
            let mut per_image = Vec::new();

            for info in &loaded.images {
                let set = loaded.set(&info.image)?;
                let metrics = search.compute(set.iter());
                let nearest: Vec<f64> = metrics.iter().filter_map(|m| m.nearest_distance()).collect();
                let ratios: Vec<f64> = set
                    .iter()
                    .filter_map(|r| r.as_cell())
                    .filter(|c| c.is_complete())
                    .map(|c| c.nucleus_to_cytoplasm_ratio())
                    .collect();
                let mut by_category = serde_json::Map::new();
                for category in Category::ALL {
                    let count = set.iter().filter(|r| r.category() == category).count();
                    by_category.insert(category.display_name().to_string(), count.into());
                }
                per_image.push(serde_json::json!({
                    "image": info.image,
                    "regions": set.len(),
                    "ignored": set.iter().filter(|r| r.is_ignored()).count(),
                    "categories": by_category,
                    "complete_cells": ratios.len(),
                    "mean_nc_ratio": mean(&ratios),
                    "isolated": metrics.iter().filter(|m| m.is_isolated()).count(),
                    "mean_nearest_distance": mean(&nearest),
                    "mean_nearest_distance_physical": mean(&nearest).map(|d| loaded.settings.to_physical(d)),
                }));
            }

            if json {
                let summary = serde_json::json!({
                    "images": stats.image_count,
                    "total_regions": stats.total_regions,
                    "ignored_regions": stats.ignored_regions,
                    "radius": radius,
                    "scale_unit": loaded.settings.scale_unit,
                    "per_image": per_image,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Images: {}", stats.image_count);
                println!("Regions: {} ({} ignored)", stats.total_regions, stats.ignored_regions);
                for entry in &per_image {
                    println!("{}:", entry["image"].as_str().unwrap_or_default());
                    println!("  regions: {}", entry["regions"]);
                    println!("  ignored: {}", entry["ignored"]);
                    println!("  complete cells: {}", entry["complete_cells"]);
                    println!("  mean N/C ratio: {}", entry["mean_nc_ratio"]);
                    println!("  isolated (r={radius}px): {}", entry["isolated"]);
                    println!(
                        "  mean nearest distance: {} px ({} {})",
                        entry["mean_nearest_distance"],
                        entry["mean_nearest_distance_physical"],
                        loaded.settings.scale_unit
                    );
                }
            }
        }

        Commands::Measure {
            input,
            output,
            format,
            include_ignored,
            radius,
        } => {
            let loaded = input.load()?;
            let search = NeighborSearch::new(NeighborConfig::default().with_radius(radius))?;
            let mut rows = Vec::new();
            for info in &loaded.images {
                let set = loaded.set(&info.image)?;
                let metrics = search.compute_map(set.iter());
                rows.extend(collect_rows(&set, &metrics, include_ignored));
            }

            let format = format.unwrap_or_else(|| format_from_extension(&output));
            let mut writer = MeasurementWriter::create(&output)?;
            match format {
                Format::Csv => writer.write_csv(&rows)?,
                Format::Json => writer.write_json(&rows)?,
            }
            println!("Wrote {} rows to {}", rows.len(), output.display());
        }

        Commands::ExportPlan {
            input,
            image,
            archive,
            json,
        } => {
            let loaded = input.load()?;
            if let Some(name) = image {
                let set = loaded.set(&name)?;
                let plan = plan_image_export(&name, set.regions())?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    println!("{}", plan.file_name());
                    for entry in plan.entries() {
                        println!("  {} ({})", entry.file_name, entry.record.geometry.type_name());
                    }
                }
            } else {
                let sets: Vec<Arc<RegionSet>> = loaded
                    .images
                    .iter()
                    .filter_map(|i| loaded.store.snapshot(&i.image))
                    .collect();
                let master = plan_master_archive(sets.iter().map(|s| &**s), archive)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&master)?);
                } else {
                    println!("{} ({} regions)", master.file_name, master.region_count());
                    for sub in &master.archives {
                        println!("  {}", sub.file_name);
                        for entry in &sub.entries {
                            println!("    {} ({})", entry.file_name, entry.record.geometry.type_name());
                        }
                    }
                }
            }
        }

        Commands::Pick {
            input,
            image,
            x,
            y,
            view,
        } => {
            let loaded = input.load()?;
            let transform = view.transform()?;
            let set = loaded.set(&image)?;
            let engine = RenderingEngine::new(RenderConfig::default(), loaded.settings.clone());
            match engine.find_region_at(Point::new(x, y), set.regions(), &transform) {
                Some(region) => println!("{} ({}, {})", region.name(), region.category(), region.id()),
                None => println!("no region at ({x}, {y})"),
            }
        }
    }

    Ok(())
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn format_from_extension(path: &Path) -> Format {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => Format::Json,
        _ => Format::Csv,
    }
}

fn output_path(output: &Path, image: &str, many: bool) -> PathBuf {
    if many {
        output.join(format!("{}_overlay.png", sanitize_file_name(image)))
    } else {
        output.to_path_buf()
    }
}
