//! Shared mock collaborators and fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use verithrax_thumbnail::{
    BackgroundSegmenter, ImageIOService, ImageSource, InpaintRequest, InpaintingEngine,
    PipelineStage, ProgressReporter, ProgressUpdate, Result, StageTimings, ThumbnailError,
};

/// Segmenter that keys out a solid backdrop color
#[derive(Debug, Clone)]
pub struct ChromaKeySegmenter {
    pub key: [u8; 3],
    pub calls: Arc<Mutex<usize>>,
}

impl ChromaKeySegmenter {
    pub fn new(key: [u8; 3]) -> Self {
        Self {
            key,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl BackgroundSegmenter for ChromaKeySegmenter {
    fn segment(&mut self, image: &DynamicImage) -> Result<DynamicImage> {
        *self.calls.lock().unwrap() += 1;
        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            if pixel.0[..3] == self.key {
                pixel.0[3] = 0;
            }
        }
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    fn name(&self) -> &str {
        "chroma-key"
    }
}

/// Segmenter that always fails
#[derive(Debug, Clone, Copy)]
pub struct BrokenSegmenter;

impl BackgroundSegmenter for BrokenSegmenter {
    fn segment(&mut self, _image: &DynamicImage) -> Result<DynamicImage> {
        Err(ThumbnailError::segmentation("session closed"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Pass-through segmenter that holds the session for a fixed time, like a
/// model on a slow CPU
#[derive(Debug, Clone, Copy)]
pub struct SlowSegmenter {
    pub delay: Duration,
}

impl SlowSegmenter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackgroundSegmenter for SlowSegmenter {
    fn segment(&mut self, image: &DynamicImage) -> Result<DynamicImage> {
        std::thread::sleep(self.delay);
        Ok(image.clone())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Engine returning a scripted response
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    pub response: std::result::Result<Vec<String>, String>,
    pub requests: Arc<Mutex<Vec<InpaintRequest>>>,
}

impl ScriptedEngine {
    pub fn ok(urls: &[&str]) -> Self {
        Self {
            response: Ok(urls.iter().map(|u| (*u).to_string()).collect()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<InpaintRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InpaintingEngine for ScriptedEngine {
    async fn generate(&self, request: &InpaintRequest) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone().map_err(ThumbnailError::engine)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// URL to bytes map standing in for the network
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: &str, image: &DynamicImage) -> Self {
        self.files
            .insert(url.to_string(), ImageIOService::encode_png(image).unwrap());
        self
    }

    pub fn with_bytes(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| ThumbnailError::invalid_image(format!("Fetching '{}' returned status 404", url)))
    }
}

/// Progress reporter that records every callback
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    pub stages: Arc<Mutex<Vec<PipelineStage>>>,
    pub completions: Arc<Mutex<Vec<StageTimings>>>,
    pub errors: Arc<Mutex<Vec<(PipelineStage, String)>>>,
}

impl RecordingReporter {
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<(PipelineStage, String)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.stages.lock().unwrap().push(update.stage);
    }

    fn report_completion(&self, timings: &StageTimings) {
        self.completions.lock().unwrap().push(timings.clone());
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        self.errors.lock().unwrap().push((stage, error.to_string()));
    }
}

pub const GREEN_SCREEN: [u8; 3] = [0, 255, 0];

/// Product photo shot against a green screen: a centered `product_w`×`product_h`
/// red box on a `width`×`height` backdrop
pub fn green_screen_photo(width: u32, height: u32, product_w: u32, product_h: u32) -> DynamicImage {
    let x0 = (width - product_w) / 2;
    let y0 = (height - product_h) / 2;
    DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        if (x0..x0 + product_w).contains(&x) && (y0..y0 + product_h).contains(&y) {
            image::Rgb([200, 30, 30])
        } else {
            image::Rgb(GREEN_SCREEN)
        }
    }))
}

/// Fully opaque RGBA image
pub fn opaque(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 255])))
}

/// Fully transparent RGBA image
pub fn transparent(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 0])))
}

/// Canvas-sized stand-in for an engine result
pub fn generated_scene(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}
