//! Mock collaborators for pipeline tests
//!
//! Segmenter, engine and image source stand-ins that run without network
//! access or model files and record how they were called.

use crate::{
    error::{Result, ThumbnailError},
    fetch::ImageSource,
    inpainting::{InpaintRequest, InpaintingEngine},
    segmentation::BackgroundSegmenter,
    services::ImageIOService,
};
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Mock segmenter that cuts out a centered ellipse
#[derive(Debug, Clone, Default)]
pub struct MockSegmenter {
    call_history: Arc<Mutex<Vec<(u32, u32)>>>,
    should_fail: bool,
}

impl MockSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock segmenter that fails every call
    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Dimensions of every image segmented so far
    pub fn get_call_history(&self) -> Vec<(u32, u32)> {
        self.call_history.lock().unwrap().clone()
    }
}

impl BackgroundSegmenter for MockSegmenter {
    fn segment(&mut self, image: &DynamicImage) -> Result<DynamicImage> {
        self.call_history.lock().unwrap().push(image.dimensions());
        if self.should_fail {
            return Err(ThumbnailError::segmentation("Mock segmenter failure"));
        }

        let source = image.to_rgba8();
        let (width, height) = source.dimensions();
        let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_fn(
            width,
            height,
            |x, y| {
                let dx = (f64::from(x) + 0.5 - cx) / (cx * 0.8);
                let dy = (f64::from(y) + 0.5 - cy) / (cy * 0.8);
                let pixel = source.get_pixel(x, y);
                if dx * dx + dy * dy <= 1.0 {
                    Rgba([pixel.0[0], pixel.0[1], pixel.0[2], 255])
                } else {
                    Rgba([0, 0, 0, 0])
                }
            },
        )))
    }

    fn name(&self) -> &str {
        "mock-ellipse"
    }
}

/// Mock engine that returns fixed URLs and keeps every request
#[derive(Debug, Clone)]
pub struct MockEngine {
    requests: Arc<Mutex<Vec<InpaintRequest>>>,
    urls: Vec<String>,
    should_fail: bool,
}

impl MockEngine {
    #[must_use]
    pub fn returning(urls: &[&str]) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            urls: urls.iter().map(|u| (*u).to_string()).collect(),
            should_fail: false,
        }
    }

    /// Create a mock engine that fails every call
    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::returning(&[])
        }
    }

    pub fn get_requests(&self) -> Vec<InpaintRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InpaintingEngine for MockEngine {
    async fn generate(&self, request: &InpaintRequest) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.should_fail {
            return Err(ThumbnailError::engine("Mock prediction failed"));
        }
        Ok(self.urls.clone())
    }

    fn name(&self) -> &str {
        "mock-engine"
    }
}

/// In-memory URL to bytes map
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    files: HashMap<String, Vec<u8>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl MemoryImageSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register raw bytes under `url`
    #[must_use]
    pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    /// Register an image under `url`, PNG-encoded
    #[must_use]
    pub fn with_image(self, url: &str, image: &DynamicImage) -> Self {
        let bytes = ImageIOService::encode_png(image).unwrap();
        self.with_bytes(url, bytes)
    }

    pub fn get_fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| ThumbnailError::invalid_image(format!("Fetching '{}' returned status 404", url)))
    }
}

/// Solid opaque product photo
#[must_use]
pub fn product_photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 200) as u8 + 40, (y % 180) as u8 + 30, 90])
    }))
}

/// Canvas-sized "generated" scene
#[must_use]
pub fn generated_scene(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([20, 24, 32])))
}
