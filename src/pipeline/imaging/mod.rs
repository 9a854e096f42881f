//! Image quality analysis and preprocessing for plant photographs.
//!
//! Every stage is a pure, synchronous transform that takes an image and
//! returns a new one. Nothing here performs I/O or holds shared state, so
//! independent images can be processed in parallel.
//!
//! Stage order on the detection path:
//! decode → `compress::render` → `sharpen::sharpen` → `compress::compress_to_budget`
//! → `quality::QualityGate::evaluate`.

pub mod compress;
pub mod metrics;
pub mod preprocess;
pub mod quality;
pub mod sharpen;
pub mod types;

pub use compress::{compress_to_budget, compute_target_dimensions, render, resize, CompressedImage};
pub use metrics::{measure, PixelMetrics};
pub use preprocess::{decode_payload, validate_image_bytes, PreparedImage, PreprocessingPipeline, SizeBounds};
pub use quality::{QualityAssessor, QualityGate, QualityReport};
pub use sharpen::sharpen;
pub use types::{CompressionOptions, EncodedImage, SourceImage};

use thiserror::Error;

/// Input and codec failures. None of these are retried: the caller has to
/// supply a fresh image.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("No image data provided")]
    Missing,

    #[error("Image data too small ({size} bytes, minimum {min})")]
    TooSmall { size: usize, min: usize },

    #[error("Image data too large ({size} bytes, maximum {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid image encoding: {0}")]
    InvalidEncoding(String),

    #[error("Unsupported image dimensions {width}x{height}")]
    UnsupportedDimensions { width: u32, height: u32 },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}
