#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Verithrax Thumbnail
//!
//! Product thumbnail pipeline for generative studio backgrounds.
//!
//! Given a product photo, the crate derives a strict binary inpainting matte
//! from the photo's transparency, places product and matte on a fixed-size
//! canvas (aspect preserved, centered), hands both to an inpainting engine and
//! resizes the engine's output to the publication size.
//!
//! ## Features
//!
//! - **Matte construction**: alpha-derived, every pixel exactly 0 (product) or 255 (background)
//! - **Canvas composition**: fixed 16-aligned canvases, Lanczos3 resampling, white backdrop
//! - **Publication rescale**: exact output size, PNG encoded
//! - **Collaborators**: HTTP image fetch, pluggable segmentation, Replicate flux-fill engine
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ### Local composition
//!
//! ```rust,no_run
//! use verithrax_thumbnail::{compose_from_bytes, ThumbnailConfig};
//!
//! # fn example(cutout_png: Vec<u8>) -> anyhow::Result<()> {
//! let config = ThumbnailConfig::default();
//! let composition = compose_from_bytes(&cutout_png, &config)?;
//! println!("Product placed at {}", composition.placement);
//! # Ok(())
//! # }
//! ```
//!
//! ### Full pipeline
//!
//! ```rust,no_run
//! use verithrax_thumbnail::{
//!     ReplicateConfig, ReplicateEngine, StudioPrompt, ThumbnailPipeline,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = ReplicateEngine::new(ReplicateConfig::from_env()?)?;
//! let pipeline = ThumbnailPipeline::builder().engine(engine).build()?;
//!
//! let prompt = StudioPrompt::new("Nebula Hoodie", None);
//! let output = pipeline
//!     .run("https://shop.example/nebula.png", &prompt)
//!     .await?;
//! output.save("nebula-hoodie.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and subscriber setup
//! - `webp-support` (default): WebP source images
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod fetch;
pub mod inpainting;
pub mod mask;
pub mod payload;
pub mod pipeline;
pub mod rescale;
pub mod segmentation;
pub mod services;
pub mod tracing_config;
pub mod types;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::{PassthroughSegmenter, ReplicateConfig, ReplicateEngine};
pub use compositor::{CanvasCompositor, RESAMPLING_FILTER};
pub use config::{
    CanvasSpec, FramingPolicy, GenerationParameters, MaskPolicy, OutputSize, ThumbnailConfig,
    ThumbnailConfigBuilder,
};
pub use error::{Result, ThumbnailError};
pub use fetch::{HttpImageFetcher, ImageSource};
pub use inpainting::{InpaintRequest, InpaintingEngine, StudioPrompt};
pub use mask::MaskBuilder;
pub use payload::ProductPayload;
pub use pipeline::{ThumbnailPipeline, ThumbnailPipelineBuilder};
pub use rescale::ResultRescaler;
pub use segmentation::{BackgroundSegmenter, SharedSegmenter};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, PipelineStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{Composition, Matte, PlacementRect, StageTimings, ThumbnailOutput};

pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;

/// Compose an already cut-out product image onto the configured canvas
///
/// The image's own transparency defines the matte; no segmentation runs.
///
/// # Arguments
///
/// * `image_bytes` - Encoded image (PNG with alpha, or any supported format)
/// * `config` - Canvas, framing and mask policy
pub fn compose_from_bytes(image_bytes: &[u8], config: &ThumbnailConfig) -> Result<Composition> {
    config.validate()?;
    let image = ImageIOService::load_from_bytes(image_bytes)?;
    let foreground = image::DynamicImage::ImageRgba8(image.to_rgba8());
    let matte = MaskBuilder::build_with_policy(&foreground, &config.mask);
    CanvasCompositor::compose_with_framing(&foreground, &matte, &config.canvas, &config.framing)
}

/// Rescale a generated image read from an async stream to the publication size
///
/// Returns PNG bytes.
///
/// ```rust,no_run
/// use verithrax_thumbnail::{rescale_from_reader, OutputSize};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("generated.png").await?;
/// let png = rescale_from_reader(file, &OutputSize::default()).await?;
/// tokio::fs::write("thumbnail.png", png).await?;
/// # Ok(())
/// # }
/// ```
pub async fn rescale_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    size: &OutputSize,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| ThumbnailError::rescale(format!("Failed to read from stream: {}", e)))?;

    ResultRescaler::rescale_bytes(&buffer, size)
}
