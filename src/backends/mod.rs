//! Concrete collaborators for the thumbnail pipeline
//!
//! - Pass-through segmentation for pre-cut product images
//! - Replicate flux-fill inpainting engine

pub mod passthrough;
pub mod replicate;

// Test utilities for pipeline testing
#[cfg(test)]
pub mod test_utils;

pub use self::passthrough::PassthroughSegmenter;
pub use self::replicate::{ReplicateConfig, ReplicateEngine};
