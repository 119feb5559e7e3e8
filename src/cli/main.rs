//! Thumbnail CLI
//!
//! Command-line interface over the matte, composition and rescale stages, plus
//! the full fetch-to-thumbnail pipeline.

use super::config::CliConfigBuilder;
use crate::{
    backends::ReplicateEngine,
    compositor::CanvasCompositor,
    mask::MaskBuilder,
    pipeline::ThumbnailPipeline,
    rescale::ResultRescaler,
    services::{ConsoleProgressReporter, ImageIOService},
    tracing_config::{events, init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, Instrument};

/// Product thumbnail pipeline tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "verithrax-thumbnail")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the binary inpainting matte of a cut-out image
    Mask(MaskArgs),
    /// Place a cut-out image and its matte on the studio canvas
    Compose(ComposeArgs),
    /// Resize a generated canvas to the publication size
    Rescale(RescaleArgs),
    /// Run the full pipeline: fetch, compose, generate, rescale
    Run(RunArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Mask(_) => "mask",
            Command::Compose(_) => "compose",
            Command::Rescale(_) => "rescale",
            Command::Run(_) => "run",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MaskArgs {
    /// Cut-out image with transparency
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output PNG. Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: String,

    /// Alpha at or below this value counts as background
    #[arg(long, default_value_t = 0)]
    pub alpha_threshold: u8,
}

/// Canvas geometry shared by `compose` and `run`
#[derive(Args, Debug, Clone)]
pub struct CanvasArgs {
    /// Canvas width (multiple of 16)
    #[arg(long, default_value_t = 1344)]
    pub width: u32,

    /// Canvas height (multiple of 16)
    #[arg(long, default_value_t = 768)]
    pub height: u32,

    /// Maximum share of the canvas width the product may fill
    #[arg(long, default_value_t = 0.8)]
    pub width_fill: f64,

    /// Maximum share of the canvas height the product may fill
    #[arg(long, default_value_t = 0.7)]
    pub height_fill: f64,

    /// Alpha at or below this value counts as background
    #[arg(long, default_value_t = 0)]
    pub alpha_threshold: u8,
}

#[derive(Args, Debug, Clone)]
pub struct ComposeArgs {
    /// Cut-out image with transparency
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to write the composed canvas
    #[arg(long, value_name = "PNG")]
    pub canvas_out: PathBuf,

    /// Where to write the canvas matte
    #[arg(long, value_name = "PNG")]
    pub mask_out: PathBuf,

    #[command(flatten)]
    pub canvas: CanvasArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RescaleArgs {
    /// Generated canvas image
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output PNG. Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: String,

    /// Publication width
    #[arg(long, default_value_t = 1248)]
    pub width: u32,

    /// Publication height
    #[arg(long, default_value_t = 612)]
    pub height: u32,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Product photo URL
    #[arg(long, required_unless_present = "payload", conflicts_with = "payload")]
    pub image_url: Option<String>,

    /// Product title
    #[arg(long, required_unless_present = "payload", conflicts_with = "payload")]
    pub title: Option<String>,

    /// Product payload JSON file (as sent by the catalog webhook)
    #[arg(long, value_name = "FILE")]
    pub payload: Option<PathBuf>,

    /// Visual style hint for the scene prompt
    #[arg(long)]
    pub style: Option<String>,

    /// Output PNG [default: slug of the product title]. Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    #[command(flatten)]
    pub canvas: CanvasArgs,

    /// Publication width
    #[arg(long, default_value_t = 1248)]
    pub output_width: u32,

    /// Publication height
    #[arg(long, default_value_t = 612)]
    pub output_height: u32,

    /// Inpainting model as owner/name
    #[arg(long)]
    pub model: Option<String>,

    /// Timeout for each HTTP request, in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;
    let span = spans::session(&session_id, cli.command.name());

    async {
        match &cli.command {
            Command::Mask(args) => run_mask(args),
            Command::Compose(args) => run_compose(args),
            Command::Rescale(args) => run_rescale(args),
            Command::Run(args) => run_pipeline(args, cli.verbose).await,
        }
    }
    .instrument(span)
    .await
}

fn run_mask(args: &MaskArgs) -> Result<()> {
    let _span = spans::file_processing(&args.input, "mask").entered();
    let config = CliConfigBuilder::mask_config(args).context("Invalid mask options")?;

    let image = ImageIOService::load_image(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let matte = MaskBuilder::build_with_policy(&image, &config.mask);
    info!(
        "Matte {}x{}: {} preserved, {} regenerated",
        matte.width(),
        matte.height(),
        matte.preserve_count(),
        matte.regenerate_count()
    );

    let bytes = ImageIOService::encode_png(&DynamicImage::ImageLuma8(matte.into_image()))
        .context("Failed to encode matte")?;
    write_output(&args.output, &bytes)
}

fn run_compose(args: &ComposeArgs) -> Result<()> {
    let _span = spans::file_processing(&args.input, "compose").entered();
    let config = CliConfigBuilder::compose_config(args).context("Invalid canvas options")?;

    let image = ImageIOService::load_image(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let foreground = DynamicImage::ImageRgba8(image.to_rgba8());
    let matte = MaskBuilder::build_with_policy(&foreground, &config.mask);
    let composition =
        CanvasCompositor::compose_with_framing(&foreground, &matte, &config.canvas, &config.framing)
            .context("Composition failed")?;
    info!("Product placed at {}", composition.placement);

    ImageIOService::save_png(&DynamicImage::ImageRgba8(composition.image), &args.canvas_out)
        .with_context(|| format!("Failed to write {}", args.canvas_out.display()))?;
    ImageIOService::save_png(
        &DynamicImage::ImageLuma8(composition.matte.into_image()),
        &args.mask_out,
    )
    .with_context(|| format!("Failed to write {}", args.mask_out.display()))?;

    events::progress(&format!(
        "Wrote {} and {}",
        args.canvas_out.display(),
        args.mask_out.display()
    ));
    Ok(())
}

fn run_rescale(args: &RescaleArgs) -> Result<()> {
    let _span = spans::file_processing(&args.input, "rescale").entered();
    let size = CliConfigBuilder::rescale_size(args).context("Invalid output size")?;

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let png = ResultRescaler::rescale_bytes(&bytes, &size).context("Rescale failed")?;
    write_output(&args.output, &png)
}

async fn run_pipeline(args: &RunArgs, verbose: u8) -> Result<()> {
    let payload = CliConfigBuilder::payload(args).context("Invalid product")?;
    let config = CliConfigBuilder::run_config(args).context("Invalid pipeline options")?;
    let engine_config = CliConfigBuilder::engine_config(args, &config)
        .context("Failed to configure the inpainting engine")?;
    debug!(?engine_config, "Engine configured");

    let engine = ReplicateEngine::new(engine_config).context("Failed to create engine")?;
    let pipeline = ThumbnailPipeline::builder()
        .config(config)
        .engine(engine)
        .progress_reporter(ConsoleProgressReporter::new(verbose > 0))
        .build()
        .context("Failed to create pipeline")?;

    let output = pipeline
        .run_payload(&payload, args.style.as_deref())
        .instrument(spans::product(&payload.post_title, &payload.product_image))
        .await
        .map_err(|e| {
            events::error_with_context(&e, &payload.product_image);
            e
        })
        .context("Thumbnail generation failed")?;

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| payload.thumbnail_filename());
    write_output(&destination, &output.png_bytes)?;
    if destination != "-" {
        events::progress(&format!("Thumbnail saved to {}", destination));
    }
    Ok(())
}

/// Write bytes to a file, or to stdout when `destination` is "-"
fn write_output(destination: &str, bytes: &[u8]) -> Result<()> {
    if destination == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes).context("Failed to write to stdout")?;
        stdout.flush().context("Failed to flush stdout")?;
        return Ok(());
    }

    let path = Path::new(destination);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
