//! Background segmentation abstraction and shared session handle

use crate::error::{Result, ThumbnailError};
use image::{DynamicImage, GenericImageView};
use std::sync::{Arc, Mutex};

/// Trait for background segmentation capabilities
///
/// Implementations return an image of the same size as the input whose
/// background pixels have alpha 0. `segment` takes `&mut self` because model
/// sessions are stateful; use [`SharedSegmenter`] to share one across tasks.
pub trait BackgroundSegmenter {
    /// Segment the product from its background
    ///
    /// # Errors
    /// - Model or session failures
    /// - Output that does not match the input dimensions
    fn segment(&mut self, image: &DynamicImage) -> Result<DynamicImage>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Process-wide segmentation handle
///
/// Created once, cloned into every pipeline. Calls are serialized by the
/// inner mutex.
#[derive(Clone)]
pub struct SharedSegmenter {
    inner: Arc<Mutex<Box<dyn BackgroundSegmenter + Send>>>,
}

impl SharedSegmenter {
    #[must_use]
    pub fn new<S: BackgroundSegmenter + Send + 'static>(segmenter: S) -> Self {
        Self::from_boxed(Box::new(segmenter))
    }

    #[must_use]
    pub fn from_boxed(segmenter: Box<dyn BackgroundSegmenter + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(segmenter)),
        }
    }

    /// Run segmentation, enforcing the same-size RGBA contract
    ///
    /// # Errors
    /// - The segmenter failed or a previous caller panicked while holding it
    /// - The result size differs from the input
    pub fn segment(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let mut segmenter = self.inner.lock().map_err(|_| {
            ThumbnailError::segmentation("Segmentation session poisoned by an earlier panic")
        })?;

        let foreground = segmenter.segment(image)?;
        if foreground.dimensions() != image.dimensions() {
            return Err(ThumbnailError::segmentation(format!(
                "{} returned {}x{} for a {}x{} input",
                segmenter.name(),
                foreground.width(),
                foreground.height(),
                image.width(),
                image.height()
            )));
        }

        Ok(match foreground {
            rgba @ DynamicImage::ImageRgba8(_) => rgba,
            other => DynamicImage::ImageRgba8(other.to_rgba8()),
        })
    }

    /// Name of the wrapped segmenter
    #[must_use]
    pub fn name(&self) -> String {
        self.inner
            .lock()
            .map_or_else(|_| "poisoned".to_string(), |s| s.name().to_string())
    }
}

impl std::fmt::Debug for SharedSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSegmenter")
            .field("segmenter", &self.name())
            .finish()
    }
}
