//! Inbound product payload
//!
//! Catalog webhooks send loosely typed JSON: ids and prices arrive as numbers
//! or strings depending on the store plugin, so both are accepted and kept
//! as text.

use crate::error::{Result, ThumbnailError};
use serde::{Deserialize, Deserializer, Serialize};

/// Product record that triggers a thumbnail run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPayload {
    /// URL of the product photo
    pub product_image: String,
    /// Product title, used in the prompt and the output file name
    pub post_title: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub post_content: Option<String>,
    #[serde(default = "default_product_link")]
    pub product_link: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub regular_price: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub sale_price: Option<String>,
    #[serde(default = "default_price_display")]
    pub price_display: String,
    #[serde(default)]
    pub attributes: String,
    #[serde(default = "default_brand_name")]
    pub brand_name: String,
    #[serde(default = "default_founders_name")]
    pub founders_name: String,
    #[serde(default)]
    pub about_brand: String,
}

fn default_product_link() -> String {
    "#".to_string()
}

fn default_price_display() -> String {
    "Check Price".to_string()
}

fn default_brand_name() -> String {
    "Our Brand".to_string()
}

fn default_founders_name() -> String {
    "The Team".to_string()
}

/// Accept a JSON string, number or null as optional text
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

impl ProductPayload {
    /// Maximum length of the slug part of the output file name
    pub const FILENAME_SLUG_LEN: usize = 50;

    /// Minimal payload with every optional field at its default
    #[must_use]
    pub fn new(product_image: impl Into<String>, post_title: impl Into<String>) -> Self {
        Self {
            product_image: product_image.into(),
            post_title: post_title.into(),
            post_id: None,
            post_content: None,
            product_link: default_product_link(),
            regular_price: None,
            sale_price: None,
            price_display: default_price_display(),
            attributes: String::new(),
            brand_name: default_brand_name(),
            founders_name: default_founders_name(),
            about_brand: String::new(),
        }
    }

    /// Parse and validate a JSON payload
    ///
    /// # Errors
    /// - Malformed JSON or missing required fields
    /// - Any [`ProductPayload::validate`] failure
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(json)
            .map_err(|e| ThumbnailError::invalid_payload(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// # Errors
    /// - Blank title
    /// - Blank image URL or one that is not http(s)
    pub fn validate(&self) -> Result<()> {
        if self.post_title.trim().is_empty() {
            return Err(ThumbnailError::invalid_payload("post_title must not be empty"));
        }
        let image = self.product_image.trim();
        if image.is_empty() {
            return Err(ThumbnailError::invalid_payload("product_image must not be empty"));
        }
        if !(image.starts_with("http://") || image.starts_with("https://")) {
            return Err(ThumbnailError::invalid_payload(format!(
                "product_image must be an http(s) URL, got '{}'",
                image
            )));
        }
        Ok(())
    }

    /// Human-readable price line
    ///
    /// A sale line is only produced when both prices are present and differ.
    #[must_use]
    pub fn price_info(&self) -> String {
        fn present(price: &Option<String>) -> Option<&str> {
            price.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        match (present(&self.regular_price), present(&self.sale_price)) {
            (Some(regular), Some(sale)) if regular != sale => {
                format!("Sale Price: {} (Regular: {})", sale, regular)
            },
            _ => format!("Price: {}", self.price_display),
        }
    }

    /// File name for the rendered thumbnail
    ///
    /// Lowercased title, every character outside `a-z0-9` replaced by `-`,
    /// cut to 50 characters, with a `.png` suffix.
    #[must_use]
    pub fn thumbnail_filename(&self) -> String {
        let slug: String = self
            .post_title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
            .take(Self::FILENAME_SLUG_LEN)
            .collect();
        format!("{}.png", slug)
    }
}
