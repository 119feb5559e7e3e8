//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{CanvasArgs, ComposeArgs, MaskArgs, RescaleArgs, RunArgs};
use crate::{
    backends::ReplicateConfig,
    config::{OutputSize, ThumbnailConfig, ThumbnailConfigBuilder},
    payload::ProductPayload,
};
use anyhow::{Context, Result};
use std::time::Duration;

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    fn canvas_builder(canvas: &CanvasArgs) -> ThumbnailConfigBuilder {
        ThumbnailConfig::builder()
            .canvas_size(canvas.width, canvas.height)
            .framing(canvas.width_fill, canvas.height_fill)
            .alpha_threshold(canvas.alpha_threshold)
    }

    pub(crate) fn mask_config(args: &MaskArgs) -> Result<ThumbnailConfig> {
        Ok(ThumbnailConfig::builder()
            .alpha_threshold(args.alpha_threshold)
            .build()?)
    }

    pub(crate) fn compose_config(args: &ComposeArgs) -> Result<ThumbnailConfig> {
        Ok(Self::canvas_builder(&args.canvas).build()?)
    }

    pub(crate) fn rescale_size(args: &RescaleArgs) -> Result<OutputSize> {
        Ok(OutputSize::new(args.width, args.height)?)
    }

    pub(crate) fn run_config(args: &RunArgs) -> Result<ThumbnailConfig> {
        Ok(Self::canvas_builder(&args.canvas)
            .output_size(args.output_width, args.output_height)
            .request_timeout_secs(args.timeout)
            .build()?)
    }

    /// Product to render, from a payload file or the `--image-url`/`--title` pair
    pub(crate) fn payload(args: &RunArgs) -> Result<ProductPayload> {
        if let Some(path) = &args.payload {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read payload {}", path.display()))?;
            return Ok(ProductPayload::from_json(&json)?);
        }

        match (&args.image_url, &args.title) {
            (Some(image_url), Some(title)) => {
                let payload = ProductPayload::new(image_url.as_str(), title.as_str());
                payload.validate()?;
                Ok(payload)
            },
            _ => anyhow::bail!("Either --payload or both --image-url and --title are required"),
        }
    }

    /// Engine configuration from the environment, adjusted by CLI flags
    pub(crate) fn engine_config(args: &RunArgs, config: &ThumbnailConfig) -> Result<ReplicateConfig> {
        let mut engine = ReplicateConfig::from_env()?
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some(model) = &args.model {
            engine = engine.with_model(model.as_str());
        }
        engine.validate()?;
        Ok(engine)
    }
}
