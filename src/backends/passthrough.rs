//! Segmenter for product images that are already cut out

use crate::{error::Result, segmentation::BackgroundSegmenter};
use image::DynamicImage;

/// Returns the input unchanged as RGBA
///
/// Intended for catalog images delivered as transparent PNGs. Opaque inputs
/// pass through fully opaque, so the whole frame is preserved.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSegmenter;

impl BackgroundSegmenter for PassthroughSegmenter {
    fn segment(&mut self, image: &DynamicImage) -> Result<DynamicImage> {
        if !image.color().has_alpha() {
            log::warn!(
                "Pass-through segmentation on an image without alpha; the whole frame will be preserved"
            );
        }
        Ok(DynamicImage::ImageRgba8(image.to_rgba8()))
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mask::MaskBuilder, segmentation::SharedSegmenter};
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_transparency_survives() {
        let mut cutout = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        cutout.put_pixel(1, 1, Rgba([250, 20, 20, 255]));

        let shared = SharedSegmenter::new(PassthroughSegmenter);
        let foreground = shared.segment(&DynamicImage::ImageRgba8(cutout.clone())).unwrap();
        assert_eq!(foreground.to_rgba8(), cutout);

        let matte = MaskBuilder::build(&foreground);
        assert_eq!(matte.preserve_count(), 1);
        assert_eq!(shared.name(), "passthrough");
    }

    #[test]
    fn test_opaque_input_becomes_rgba() {
        let out = PassthroughSegmenter
            .segment(&DynamicImage::new_rgb8(3, 2))
            .unwrap();
        assert!(out.color().has_alpha());
        assert!(out.to_rgba8().pixels().all(|p| p.0[3] == 255));
    }
}
