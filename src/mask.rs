//! Binary matte construction from a foreground transparency channel

use crate::{config::MaskPolicy, types::Matte};
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

/// Builds inpainting mattes from segmented foreground images
pub struct MaskBuilder;

impl MaskBuilder {
    /// Build a matte with the default policy (only fully transparent pixels
    /// are background)
    #[must_use]
    pub fn build(foreground: &DynamicImage) -> Matte {
        Self::build_with_policy(foreground, &MaskPolicy::default())
    }

    /// Build a matte of the same size as `foreground`
    ///
    /// Pixels whose alpha classifies as background become 255, everything
    /// else becomes 0. Images without an alpha channel are fully opaque and
    /// yield an all-preserve matte.
    #[must_use]
    pub fn build_with_policy(foreground: &DynamicImage, policy: &MaskPolicy) -> Matte {
        let (width, height) = (foreground.width(), foreground.height());

        let matte = if foreground.color().has_alpha() {
            let rgba = foreground.to_rgba8();
            GrayImage::from_fn(width, height, |x, y| {
                let alpha = rgba.get_pixel(x, y).0[3];
                Luma([if policy.is_background(alpha) {
                    Matte::REGENERATE
                } else {
                    Matte::PRESERVE
                }])
            })
        } else {
            GrayImage::from_pixel(width, height, Luma([Matte::PRESERVE]))
        };

        debug!(
            width,
            height,
            alpha_threshold = policy.alpha_threshold,
            "Built binary matte"
        );

        Matte::from_binary(matte)
    }
}
