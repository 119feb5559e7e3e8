//! Image I/O operations service
//!
//! Keeps file and codec handling out of the pipeline stages so the stages stay
//! pure functions over in-memory images.

use crate::error::{Result, ThumbnailError};
use image::{DynamicImage, ImageFormat};
use std::{io::Cursor, path::Path};

/// Service for image file input/output and PNG handoff encoding
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content-based format detection when the extension is
    /// missing or wrong.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use verithrax_thumbnail::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("product.png")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Content is not a decodable image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ThumbnailError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    ThumbnailError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    ThumbnailError::invalid_image(format!(
                        "Failed to decode '{}' ({} bytes): {}",
                        path_ref.display(),
                        data.len(),
                        content_err
                    ))
                })
            },
        }
    }

    /// Decode an image from raw bytes
    ///
    /// # Errors
    /// - Bytes are not a supported image format
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| {
            ThumbnailError::invalid_image(format!("Failed to decode image from bytes: {}", e))
        })
    }

    /// Encode an image as lossless PNG in memory
    ///
    /// Returns the raw codec error so each stage can attribute the failure to
    /// itself.
    ///
    /// # Errors
    /// - PNG encoder failure
    pub fn encode_png(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Save an image as PNG, creating the parent directory if needed
    ///
    /// # Errors
    /// - Directory creation, encoding or write failures
    pub fn save_png<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ThumbnailError::file_io_error("create output directory", parent, &e)
            })?;
        }

        image
            .save_with_format(path_ref, ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io_err) => {
                    ThumbnailError::file_io_error("write PNG", path_ref, &io_err)
                },
                other => ThumbnailError::invalid_image(format!(
                    "Failed to save '{}' as PNG: {}",
                    path_ref.display(),
                    other
                )),
            })
    }

    /// Check if a file path has an extension the loader understands
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp"))
    }
}
