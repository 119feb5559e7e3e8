//! Remote image retrieval

use crate::{
    error::{Result, ThumbnailError},
    services::ImageIOService,
};
use async_trait::async_trait;
use image::DynamicImage;
use std::time::Duration;
use tracing::debug;

/// Source of image bytes addressed by URL
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Download the raw bytes behind `url`
    ///
    /// # Errors
    /// - Transport failure or non-success status
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Download and decode an image
    ///
    /// # Errors
    /// - Any [`ImageSource::fetch_bytes`] failure
    /// - Content that is not a decodable image
    async fn fetch_image(&self, url: &str) -> Result<DynamicImage> {
        let bytes = self.fetch_bytes(url).await?;
        ImageIOService::load_from_bytes(&bytes)
            .map_err(|e| ThumbnailError::invalid_image(format!("{} ({})", e, url)))
    }
}

/// `reqwest`-backed image fetcher
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    ///
    /// # Errors
    /// - The HTTP client could not be constructed
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("verithrax-thumbnail/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ThumbnailError::invalid_config(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSource for HttpImageFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            ThumbnailError::invalid_image(format!("Failed to fetch '{}': {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ThumbnailError::invalid_image(format!(
                "Fetching '{}' returned status {}",
                url, status
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            ThumbnailError::invalid_image(format!("Failed to read body of '{}': {}", url, e))
        })?;
        debug!(url, bytes = bytes.len(), "Fetched remote image");
        Ok(bytes.to_vec())
    }
}
