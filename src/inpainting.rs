//! Inpainting engine abstraction and studio prompt rendering

use crate::{config::GenerationParameters, error::Result};
use async_trait::async_trait;

/// One generation request: canvas and matte as PNG bytes plus the prompt
#[derive(Clone)]
pub struct InpaintRequest {
    /// PNG-encoded RGBA canvas
    pub canvas_png: Vec<u8>,
    /// PNG-encoded binary matte, 255 marks pixels to regenerate
    pub mask_png: Vec<u8>,
    /// Rendered scene prompt
    pub prompt: String,
    /// Engine parameters
    pub parameters: GenerationParameters,
}

impl std::fmt::Debug for InpaintRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InpaintRequest")
            .field("canvas_png", &format_args!("{} bytes", self.canvas_png.len()))
            .field("mask_png", &format_args!("{} bytes", self.mask_png.len()))
            .field("prompt", &self.prompt)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Trait for generative background inpainting services
#[async_trait]
pub trait InpaintingEngine: Send + Sync {
    /// Generate a scene around the preserved pixels
    ///
    /// Returns result image URLs; callers use the first one.
    ///
    /// # Errors
    /// - Transport failures or non-success responses
    /// - Failed predictions or output without a URL
    async fn generate(&self, request: &InpaintRequest) -> Result<Vec<String>>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Studio-scene prompt for product thumbnails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioPrompt {
    product_name: String,
    style: String,
}

impl StudioPrompt {
    /// Style used when no visual description is available
    pub const DEFAULT_STYLE: &'static str = "modern streetwear aesthetic";

    /// Create a prompt; a blank `style` falls back to [`Self::DEFAULT_STYLE`]
    #[must_use]
    pub fn new(product_name: impl Into<String>, style: Option<&str>) -> Self {
        let style = style
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_STYLE);
        Self {
            product_name: product_name.into().trim().to_string(),
            style: style.to_string(),
        }
    }

    #[must_use]
    pub fn style(&self) -> &str {
        &self.style
    }

    /// Render the full prompt text
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "Product photography of {} in a premium luxury studio setting.\n\
             Dark moody atmosphere with subtle neon accent lighting.\n\
             Concrete or industrial textures in the background.\n\
             Soft professional rim lighting highlighting the product.\n\
             Clean, high-end aesthetic matching {}.\n\
             8k resolution, masterpiece quality, commercial photography.",
            self.product_name, self.style
        )
    }
}

impl std::fmt::Display for StudioPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}
