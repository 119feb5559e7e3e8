//! Configuration types for thumbnail pipeline operations

use crate::error::{Result, ThumbnailError};
use serde::{Deserialize, Serialize};

/// Fixed working surface handed to the inpainting engine
///
/// Both dimensions must be non-zero multiples of [`CanvasSpec::ALIGNMENT`],
/// which is what the inpainting backends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
}

impl CanvasSpec {
    /// Required dimension alignment in pixels
    pub const ALIGNMENT: u32 = 16;

    /// Create a validated canvas specification
    ///
    /// # Errors
    /// - Either dimension is zero or not a multiple of 16
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = Self { width, height };
        canvas.validate()?;
        Ok(canvas)
    }

    /// Validate canvas dimensions
    ///
    /// # Errors
    /// - Either dimension is zero or not a multiple of 16
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("canvas width", self.width), ("canvas height", self.height)] {
            if value == 0 || value % Self::ALIGNMENT != 0 {
                let aligned = (value / Self::ALIGNMENT).max(1) * Self::ALIGNMENT;
                return Err(ThumbnailError::config_value_error(
                    name,
                    value,
                    "non-zero multiples of 16",
                    Some(aligned),
                ));
            }
        }
        Ok(())
    }

    /// Canvas dimensions as a `(width, height)` tuple
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for CanvasSpec {
    fn default() -> Self {
        // Landscape target accepted by flux-fill
        Self {
            width: 1344,
            height: 768,
        }
    }
}

/// Final publication size of the generated thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

impl OutputSize {
    /// Create a validated output size
    ///
    /// # Errors
    /// - Either dimension is zero
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let size = Self { width, height };
        size.validate()?;
        Ok(size)
    }

    /// # Errors
    /// - Either dimension is zero
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ThumbnailError::invalid_config(format!(
                "Output size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for OutputSize {
    fn default() -> Self {
        // Article header size
        Self {
            width: 1248,
            height: 612,
        }
    }
}

/// How much of the canvas the product may occupy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramingPolicy {
    /// Maximum share of the canvas width (0, 1]
    pub width_fill: f64,
    /// Maximum share of the canvas height (0, 1]
    pub height_fill: f64,
}

impl FramingPolicy {
    /// # Errors
    /// - A fill factor outside (0, 1]
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width fill", self.width_fill), ("height fill", self.height_fill)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ThumbnailError::config_value_error(
                    name,
                    value,
                    "(0, 1]",
                    None,
                ));
            }
        }
        Ok(())
    }
}

impl Default for FramingPolicy {
    fn default() -> Self {
        Self {
            width_fill: 0.8,
            height_fill: 0.7,
        }
    }
}

/// Policy for turning a transparency channel into a binary matte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaskPolicy {
    /// Pixels with alpha at or below this value are background.
    ///
    /// The default of 0 only treats fully transparent pixels as background, so
    /// anti-aliased edges are preserved. Raising it trims the halo those edges
    /// can leave after inpainting.
    pub alpha_threshold: u8,
}

impl MaskPolicy {
    /// Whether an alpha value classifies as background
    #[must_use]
    pub fn is_background(&self, alpha: u8) -> bool {
        alpha <= self.alpha_threshold
    }
}

/// Parameters forwarded to the inpainting engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Prompt adherence strength
    pub guidance: f32,
    /// Output encoding requested from the engine
    pub output_format: String,
    /// Content moderation tolerance (1 strict .. 6 permissive)
    pub safety_tolerance: u8,
}

impl GenerationParameters {
    /// # Errors
    /// - Non-positive guidance, unknown output format, tolerance outside 1-6
    pub fn validate(&self) -> Result<()> {
        if !(self.guidance.is_finite() && self.guidance > 0.0) {
            return Err(ThumbnailError::config_value_error(
                "guidance",
                self.guidance,
                "> 0",
                Some(30.0),
            ));
        }
        if !matches!(self.output_format.as_str(), "png" | "jpg") {
            return Err(ThumbnailError::invalid_config(format!(
                "Unsupported engine output format '{}' (expected png or jpg)",
                self.output_format
            )));
        }
        if !(1..=6).contains(&self.safety_tolerance) {
            return Err(ThumbnailError::config_value_error(
                "safety tolerance",
                self.safety_tolerance,
                "1-6",
                Some(2),
            ));
        }
        Ok(())
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            guidance: 30.0,
            output_format: "png".to_string(),
            safety_tolerance: 2,
        }
    }
}

/// Configuration for a thumbnail pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Canvas sent to the inpainting engine
    pub canvas: CanvasSpec,

    /// Final publication size
    pub output_size: OutputSize,

    /// Product framing on the canvas
    pub framing: FramingPolicy,

    /// Transparency classification
    pub mask: MaskPolicy,

    /// Engine generation parameters
    pub generation: GenerationParameters,

    /// Timeout for each outbound HTTP request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSpec::default(),
            output_size: OutputSize::default(),
            framing: FramingPolicy::default(),
            mask: MaskPolicy::default(),
            generation: GenerationParameters::default(),
            request_timeout_secs: 120,
        }
    }
}

impl ThumbnailConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verithrax_thumbnail::ThumbnailConfig;
    ///
    /// let config = ThumbnailConfig::builder()
    ///     .canvas_size(1024, 1024)
    ///     .alpha_threshold(8)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.canvas.width, 1024);
    /// ```
    #[must_use]
    pub fn builder() -> ThumbnailConfigBuilder {
        ThumbnailConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Canvas dimensions not multiples of 16
    /// - Zero output size
    /// - Fill factors outside (0, 1]
    /// - Invalid generation parameters or a zero timeout
    pub fn validate(&self) -> Result<()> {
        self.canvas.validate()?;
        self.output_size.validate()?;
        self.framing.validate()?;
        self.generation.validate()?;
        if self.request_timeout_secs == 0 {
            return Err(ThumbnailError::config_value_error(
                "request timeout",
                self.request_timeout_secs,
                "> 0 seconds",
                Some(120),
            ));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for `ThumbnailConfig`
#[derive(Debug, Default)]
pub struct ThumbnailConfigBuilder {
    config: ThumbnailConfig,
}

impl ThumbnailConfigBuilder {
    #[must_use]
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas = CanvasSpec { width, height };
        self
    }

    #[must_use]
    pub fn output_size(mut self, width: u32, height: u32) -> Self {
        self.config.output_size = OutputSize { width, height };
        self
    }

    #[must_use]
    pub fn framing(mut self, width_fill: f64, height_fill: f64) -> Self {
        self.config.framing = FramingPolicy {
            width_fill,
            height_fill,
        };
        self
    }

    #[must_use]
    pub fn alpha_threshold(mut self, threshold: u8) -> Self {
        self.config.mask.alpha_threshold = threshold;
        self
    }

    #[must_use]
    pub fn guidance(mut self, guidance: f32) -> Self {
        self.config.generation.guidance = guidance;
        self
    }

    #[must_use]
    pub fn safety_tolerance(mut self, tolerance: u8) -> Self {
        self.config.generation.safety_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any validation failure from [`ThumbnailConfig::validate`]
    pub fn build(self) -> Result<ThumbnailConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
