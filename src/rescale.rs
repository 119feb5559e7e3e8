//! Final resize of the generated canvas to publication size

use crate::{
    compositor::RESAMPLING_FILTER,
    config::OutputSize,
    error::{Result, ThumbnailError},
    services::ImageIOService,
};
use image::{imageops, DynamicImage, GenericImageView};
use tracing::debug;

/// Resizes engine output to the fixed publication size
pub struct ResultRescaler;

impl ResultRescaler {
    /// Resize `generated` to exactly `size`
    ///
    /// The aspect ratio is not preserved; the canvas and publication sizes are
    /// close enough that the distortion is negligible.
    ///
    /// # Errors
    /// - Zero-sized input or output
    pub fn rescale(generated: &DynamicImage, size: &OutputSize) -> Result<DynamicImage> {
        size.validate()
            .map_err(|e| ThumbnailError::rescale(e.to_string()))?;
        let (width, height) = generated.dimensions();
        if width == 0 || height == 0 {
            return Err(ThumbnailError::rescale(format!(
                "Generated image has degenerate dimensions {}x{}",
                width, height
            )));
        }

        debug!(
            from = %format!("{}x{}", width, height),
            to = %format!("{}x{}", size.width, size.height),
            "Rescaling generated image"
        );

        let resized = if generated.color().has_alpha() {
            DynamicImage::ImageRgba8(imageops::resize(
                &generated.to_rgba8(),
                size.width,
                size.height,
                RESAMPLING_FILTER,
            ))
        } else {
            DynamicImage::ImageRgb8(imageops::resize(
                &generated.to_rgb8(),
                size.width,
                size.height,
                RESAMPLING_FILTER,
            ))
        };
        Ok(resized)
    }

    /// Decode engine output bytes, resize, and encode the result as PNG
    ///
    /// # Errors
    /// - Undecodable input bytes
    /// - Resize or PNG encode failure
    pub fn rescale_bytes(generated: &[u8], size: &OutputSize) -> Result<Vec<u8>> {
        let image = image::load_from_memory(generated).map_err(|e| {
            ThumbnailError::rescale(format!(
                "Failed to decode generated image ({} bytes): {}",
                generated.len(),
                e
            ))
        })?;
        let resized = Self::rescale(&image, size)?;
        ImageIOService::encode_png(&resized)
            .map_err(|e| ThumbnailError::rescale(format!("Failed to encode thumbnail: {}", e)))
    }
}
