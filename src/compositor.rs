//! Aspect-preserving placement of a foreground and its matte on the
//! inpainting canvas

use crate::{
    config::{CanvasSpec, FramingPolicy},
    error::{Result, ThumbnailError},
    types::{Composition, Matte, PlacementRect},
};
use image::{
    imageops::{self, FilterType},
    DynamicImage, GenericImageView, GrayImage, Luma, Rgba, Rgba32FImage, RgbaImage,
};
use tracing::{debug, instrument};

/// Resampling filter shared by image, matte and final rescale
pub const RESAMPLING_FILTER: FilterType = FilterType::Lanczos3;

const CANVAS_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Places a segmented product on a fixed-size white canvas and builds the
/// matching canvas matte
pub struct CanvasCompositor;

impl CanvasCompositor {
    /// Compose with the default studio framing (80% of width, 70% of height)
    ///
    /// # Errors
    /// - Canvas dimensions are zero or not 16-aligned
    /// - Zero-sized foreground
    /// - Matte dimensions differ from the foreground
    pub fn compose(
        foreground: &DynamicImage,
        matte: &Matte,
        canvas: &CanvasSpec,
    ) -> Result<Composition> {
        Self::compose_with_framing(foreground, matte, canvas, &FramingPolicy::default())
    }

    /// Scale, center and composite `foreground` and `matte` onto `canvas`
    ///
    /// Both inputs are resized with the same filter so they stay
    /// pixel-aligned. The foreground is resampled with premultiplied alpha so
    /// fully transparent pixels contribute no color to the product's edge.
    /// It is then alpha-blended onto opaque white; the matte is stamped onto
    /// an all-regenerate canvas matte without blending.
    ///
    /// # Errors
    /// - Canvas dimensions are zero or not 16-aligned
    /// - Fill fractions outside (0, 1]
    /// - Zero-sized foreground
    /// - Matte dimensions differ from the foreground
    /// - Placement arithmetic produced a non-finite scale
    #[instrument(
        skip(foreground, matte),
        fields(
            source = %format!("{}x{}", foreground.width(), foreground.height()),
            canvas = %format!("{}x{}", canvas.width, canvas.height)
        )
    )]
    pub fn compose_with_framing(
        foreground: &DynamicImage,
        matte: &Matte,
        canvas: &CanvasSpec,
        framing: &FramingPolicy,
    ) -> Result<Composition> {
        canvas.validate()?;
        framing.validate()?;
        if matte.dimensions() != foreground.dimensions() {
            return Err(ThumbnailError::composition(format!(
                "Matte is {}x{} but foreground is {}x{}",
                matte.width(),
                matte.height(),
                foreground.width(),
                foreground.height()
            )));
        }

        let placement = Self::placement(foreground.dimensions(), canvas, framing)?;
        debug!(%placement, "Computed product placement");

        let resized_foreground =
            Self::resize_premultiplied(&foreground.to_rgba8(), placement.width, placement.height);
        let resized_matte = Matte::binarize(&imageops::resize(
            matte.as_image(),
            placement.width,
            placement.height,
            RESAMPLING_FILTER,
        ));

        let mut canvas_image = RgbaImage::from_pixel(canvas.width, canvas.height, CANVAS_WHITE);
        Self::blend_over(&mut canvas_image, &resized_foreground, placement.x, placement.y);

        let mut canvas_matte =
            GrayImage::from_pixel(canvas.width, canvas.height, Luma([Matte::REGENERATE]));
        imageops::replace(
            &mut canvas_matte,
            resized_matte.as_image(),
            i64::from(placement.x),
            i64::from(placement.y),
        );

        Ok(Composition {
            image: canvas_image,
            matte: Matte::from_binary(canvas_matte),
            placement,
        })
    }

    /// Compute where a `source`-sized foreground lands on `canvas`
    ///
    /// `ratio = min(W * width_fill / w, H * height_fill / h)`, the scaled size
    /// is rounded to the nearest pixel and the offset is floor-centered, so an
    /// odd remainder leaves the extra pixel on the right/bottom margin.
    ///
    /// # Errors
    /// - Either source dimension is zero
    /// - The scale factor is not finite
    pub fn placement(
        source: (u32, u32),
        canvas: &CanvasSpec,
        framing: &FramingPolicy,
    ) -> Result<PlacementRect> {
        let (source_width, source_height) = source;
        if source_width == 0 || source_height == 0 {
            return Err(ThumbnailError::composition(format!(
                "Foreground has degenerate dimensions {}x{}",
                source_width, source_height
            )));
        }

        let ratio = ((f64::from(canvas.width) * framing.width_fill) / f64::from(source_width))
            .min((f64::from(canvas.height) * framing.height_fill) / f64::from(source_height));
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ThumbnailError::composition(format!(
                "Invalid scale factor {} for {}x{} on {}x{}",
                ratio, source_width, source_height, canvas.width, canvas.height
            )));
        }

        let width = Self::scaled_dimension(source_width, ratio, canvas.width);
        let height = Self::scaled_dimension(source_height, ratio, canvas.height);

        Ok(PlacementRect {
            x: (canvas.width - width) / 2,
            y: (canvas.height - height) / 2,
            width,
            height,
        })
    }

    /// Resample an RGBA image with color weighted by alpha
    ///
    /// Works in normalized `f32` so the filter's ringing clamps the same way
    /// on every channel. Pixels that end up fully transparent come back as
    /// `[0, 0, 0, 0]`.
    fn resize_premultiplied(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        let premultiplied = Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
            let [r, g, b, a] = image.get_pixel(x, y).0;
            let alpha = f32::from(a) / 255.0;
            let channel = |c: u8| f32::from(c) / 255.0 * alpha;
            Rgba([channel(r), channel(g), channel(b), alpha])
        });
        let resized = imageops::resize(&premultiplied, width, height, RESAMPLING_FILTER);

        RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b, a] = resized.get_pixel(x, y).0;
            let alpha = a.clamp(0.0, 1.0);
            let alpha_byte = (alpha * 255.0).round() as u8;
            if alpha_byte == 0 {
                return Rgba([0, 0, 0, 0]);
            }
            let channel = |c: f32| ((c / alpha).clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgba([channel(r), channel(g), channel(b), alpha_byte])
        })
    }

    fn scaled_dimension(source: u32, ratio: f64, limit: u32) -> u32 {
        let scaled = (f64::from(source) * ratio).round();
        // Extreme aspect ratios can round a side down to nothing
        (scaled as u32).clamp(1, limit)
    }

    /// Source-over blend of `top` onto an opaque `base` at (x, y)
    fn blend_over(base: &mut RgbaImage, top: &RgbaImage, x: u32, y: u32) {
        for (dx, dy, pixel) in top.enumerate_pixels() {
            let alpha = u32::from(pixel.0[3]);
            if alpha == 0 {
                continue;
            }
            let Some(target) = base.get_pixel_mut_checked(x + dx, y + dy) else {
                continue;
            };
            if alpha == 255 {
                *target = Rgba([pixel.0[0], pixel.0[1], pixel.0[2], 255]);
                continue;
            }
            let inverse = 255 - alpha;
            let mix = |fg: u8, bg: u8| -> u8 {
                ((u32::from(fg) * alpha + u32::from(bg) * inverse + 127) / 255) as u8
            };
            *target = Rgba([
                mix(pixel.0[0], target.0[0]),
                mix(pixel.0[1], target.0[1]),
                mix(pixel.0[2], target.0[2]),
                255,
            ]);
        }
    }
}
