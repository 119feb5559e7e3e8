//! Error types for thumbnail pipeline operations

use crate::services::PipelineStage;
use thiserror::Error;

/// Result type alias for thumbnail pipeline operations
pub type Result<T> = std::result::Result<T, ThumbnailError>;

/// Typed failures, one family per pipeline stage
#[derive(Error, Debug)]
pub enum ThumbnailError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source image could not be fetched or decoded
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The background segmentation capability failed
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Degenerate input dimensions or placement arithmetic failure
    #[error("Composition error: {0}")]
    Composition(String),

    /// The inpainting engine failed or returned malformed output
    #[error("Engine error: {0}")]
    Engine(String),

    /// Decode or resize failure on the generated result
    #[error("Rescale error: {0}")]
    Rescale(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inbound product payload failed validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl ThumbnailError {
    /// Create a new invalid image error
    pub fn invalid_image<S: Into<String>>(msg: S) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new composition error
    pub fn composition<S: Into<String>>(msg: S) -> Self {
        Self::Composition(msg.into())
    }

    /// Create a new engine error
    pub fn engine<S: Into<String>>(msg: S) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a new rescale error
    pub fn rescale<S: Into<String>>(msg: S) -> Self {
        Self::Rescale(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid payload error
    pub fn invalid_payload<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPayload(msg.into())
    }

    // Enhanced contextual error creators

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create an engine error for a failed HTTP exchange
    pub fn engine_http_error(operation: &str, error: &reqwest::Error) -> Self {
        let status = error
            .status()
            .map_or_else(String::new, |s| format!(" (status {})", s));
        Self::Engine(format!("{} failed{}: {}", operation, status, error))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Pipeline stage this error belongs to, if it is stage-specific
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::InvalidImage(_) => Some(PipelineStage::ImageFetch),
            Self::Segmentation(_) => Some(PipelineStage::Segmentation),
            Self::Composition(_) => Some(PipelineStage::Composition),
            Self::Engine(_) => Some(PipelineStage::Generation),
            Self::Rescale(_) => Some(PipelineStage::Rescale),
            Self::Io(_) | Self::InvalidConfig(_) | Self::InvalidPayload(_) => None,
        }
    }
}
