//! Core value types passed between pipeline stages

use crate::{
    config::CanvasSpec,
    error::{Result, ThumbnailError},
};
use image::{GrayImage, Luma, RgbaImage};
use serde::{Deserialize, Serialize};

/// Binary inpainting matte
///
/// Every pixel is exactly [`Matte::PRESERVE`] (product, never altered) or
/// [`Matte::REGENERATE`] (background, repainted by the engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matte {
    image: GrayImage,
}

impl Matte {
    /// Pixel value marking product pixels
    pub const PRESERVE: u8 = 0;
    /// Pixel value marking background pixels
    pub const REGENERATE: u8 = 255;

    /// Create a matte filled with a single value
    ///
    /// # Errors
    /// - `value` is neither 0 nor 255
    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self> {
        Self::check_value(value)?;
        Ok(Self {
            image: GrayImage::from_pixel(width, height, Luma([value])),
        })
    }

    /// Wrap an existing grayscale image, checking that it is strictly binary
    ///
    /// # Errors
    /// - Any pixel other than 0 or 255
    pub fn from_gray(image: GrayImage) -> Result<Self> {
        if let Some(value) = image
            .as_raw()
            .iter()
            .copied()
            .find(|v| *v != Self::PRESERVE && *v != Self::REGENERATE)
        {
            return Err(ThumbnailError::composition(format!(
                "Matte contains intermediate value {}",
                value
            )));
        }
        Ok(Self { image })
    }

    /// Snap a grayscale image to a binary matte at the midpoint
    #[must_use]
    pub fn binarize(image: &GrayImage) -> Self {
        let mut snapped = image.clone();
        for pixel in snapped.pixels_mut() {
            pixel.0 = [if pixel.0[0] < 128 {
                Self::PRESERVE
            } else {
                Self::REGENERATE
            }];
        }
        Self { image: snapped }
    }

    /// Wrap an image already known to hold only 0 and 255
    pub(crate) fn from_binary(image: GrayImage) -> Self {
        debug_assert!(image
            .as_raw()
            .iter()
            .all(|v| *v == Self::PRESERVE || *v == Self::REGENERATE));
        Self { image }
    }

    fn check_value(value: u8) -> Result<()> {
        if value == Self::PRESERVE || value == Self::REGENERATE {
            Ok(())
        } else {
            Err(ThumbnailError::composition(format!(
                "Matte value must be 0 or 255, got {}",
                value
            )))
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Matte value at a pixel, `None` outside the matte
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    /// Number of pixels marked as product
    #[must_use]
    pub fn preserve_count(&self) -> usize {
        self.image
            .as_raw()
            .iter()
            .filter(|v| **v == Self::PRESERVE)
            .count()
    }

    /// Number of pixels marked for regeneration
    #[must_use]
    pub fn regenerate_count(&self) -> usize {
        self.image.as_raw().len() - self.preserve_count()
    }

    /// Borrow the underlying grayscale image
    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Consume the matte, returning the grayscale image
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

/// Where the resized foreground sits on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlacementRect {
    /// Whether the rectangle lies fully inside the canvas
    #[must_use]
    pub fn fits_within(&self, canvas: &CanvasSpec) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(canvas.width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(canvas.height)
    }

    /// Whether a canvas pixel falls inside the rectangle
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

impl std::fmt::Display for PlacementRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Canvas image and matte ready for the inpainting engine
#[derive(Debug, Clone)]
pub struct Composition {
    /// RGBA canvas, opaque white outside the product
    pub image: RgbaImage,
    /// Canvas matte, pixel-aligned with `image`
    pub matte: Matte,
    /// Placement of the product on both canvases
    pub placement: PlacementRect,
}

/// Per-stage timing breakdown of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub fetch_ms: u64,
    pub segmentation_ms: u64,
    pub mask_ms: u64,
    pub composition_ms: u64,
    pub generation_ms: u64,
    pub rescale_ms: u64,
    pub total_ms: u64,
}

impl StageTimings {
    /// Share of the total spent waiting on the inpainting engine
    #[must_use]
    pub fn generation_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.generation_ms as f64 / self.total_ms as f64
        }
    }

    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Fetch: {}ms | Segment: {}ms | Mask: {}ms | Compose: {}ms | Generate: {}ms | Rescale: {}ms",
            self.total_ms,
            self.fetch_ms,
            self.segmentation_ms,
            self.mask_ms,
            self.composition_ms,
            self.generation_ms,
            self.rescale_ms
        )
    }
}

/// Final product of a pipeline run
#[derive(Debug, Clone)]
pub struct ThumbnailOutput {
    /// PNG-encoded thumbnail at publication size
    pub png_bytes: Vec<u8>,
    /// Thumbnail dimensions
    pub dimensions: (u32, u32),
    /// Placement used on the inpainting canvas
    pub placement: PlacementRect,
    /// Engine result URL the thumbnail was rescaled from
    pub source_url: String,
    /// Per-stage timings
    pub timings: StageTimings,
}

impl ThumbnailOutput {
    /// Write the PNG bytes to a file
    ///
    /// # Errors
    /// - File creation or write failures
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.png_bytes)
            .map_err(|e| ThumbnailError::file_io_error("write thumbnail", path, &e))
    }
}
