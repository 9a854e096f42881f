//! Boundary checks and the preprocessing pipeline that prepares a photo for
//! the classifier.
//!
//! Pipeline flow:
//! 1. Decode
//! 2. `compress::render`: shrink to fit, raise to the dimension floor
//! 3. `sharpen::sharpen` (detection path only)
//! 4. `compress::compress_to_budget`: JPEG within the byte budget

use base64::Engine;
use tracing::debug;

use super::compress::{compress_to_budget, render};
use super::sharpen::sharpen;
use super::types::{CompressionOptions, EncodedImage, SourceImage};
use super::ImageError;
use crate::config::{MAX_UPLOAD_BYTES, MIN_ANALYZE_BYTES, MIN_DETECT_BYTES};

// ═══════════════════════════════════════════════════════════
// Boundary validation
// ═══════════════════════════════════════════════════════════

/// Accepted encoded size range for one calling surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min_bytes: usize,
    pub max_bytes: usize,
}

impl SizeBounds {
    /// Classification surface: 5 KB – 6 MB.
    pub fn detect() -> Self {
        Self {
            min_bytes: MIN_DETECT_BYTES,
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Quality analysis surface: 10 KB – 6 MB.
    pub fn analyze() -> Self {
        Self {
            min_bytes: MIN_ANALYZE_BYTES,
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

/// Decode a base64 payload, with or without a `data:image/...;base64,` prefix.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, ImageError> {
    let trimmed = payload.trim();
    let data = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => {
                return Err(ImageError::InvalidEncoding(
                    "data URI has no payload".into(),
                ))
            }
        },
        None => trimmed,
    };

    if data.is_empty() {
        return Err(ImageError::Missing);
    }

    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| ImageError::InvalidEncoding(format!("Base64 decode failed: {e}")))
}

/// Reject encoded images outside `bounds` before any decode is attempted.
pub fn validate_image_bytes(bytes: &[u8], bounds: SizeBounds) -> Result<(), ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Missing);
    }
    if bytes.len() < bounds.min_bytes {
        return Err(ImageError::TooSmall {
            size: bytes.len(),
            min: bounds.min_bytes,
        });
    }
    if bytes.len() > bounds.max_bytes {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            max: bounds.max_bytes,
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// PreprocessingPipeline
// ═══════════════════════════════════════════════════════════

/// Result of preprocessing: rendered pixels plus the JPEG sent upstream.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Rendered (and possibly sharpened) pixels with their JPEG encoding.
    pub image: SourceImage,
    /// JPEG quality the encoding settled on.
    pub quality: f32,
    /// Re-encodes the compression loop needed.
    pub iterations: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreparedImage {
    pub fn jpeg_bytes(&self) -> &[u8] {
        &self.image.encoded.bytes
    }
}

/// Resize, optional sharpen, compress. Pure and synchronous: callers on an
/// async runtime should run it on a blocking thread.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessingPipeline {
    options: CompressionOptions,
    sharpen: bool,
}

impl PreprocessingPipeline {
    /// Plain compression path, no sharpening.
    pub fn compression_only(options: CompressionOptions) -> Self {
        Self {
            options,
            sharpen: false,
        }
    }

    /// Detection path: sharpened once after resizing.
    pub fn for_detection(options: CompressionOptions) -> Self {
        Self {
            options,
            sharpen: true,
        }
    }

    pub fn run(&self, source: &SourceImage) -> Result<PreparedImage, ImageError> {
        let (orig_w, orig_h) = (source.width(), source.height());

        let rendered = render(&source.pixels, &self.options)?;
        let pixels = if self.sharpen {
            sharpen(&rendered)
        } else {
            rendered
        };

        let compressed = compress_to_budget(&pixels, &self.options)?;

        debug!(
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{}x{}", compressed.image.width, compressed.image.height),
            jpeg_size = compressed.image.len(),
            quality = compressed.quality,
            sharpened = self.sharpen,
            "Image preprocessed for classifier"
        );

        Ok(PreparedImage {
            image: SourceImage {
                pixels,
                encoded: EncodedImage {
                    bytes: compressed.image.bytes,
                    width: compressed.image.width,
                    height: compressed.image.height,
                },
            },
            quality: compressed.quality,
            iterations: compressed.iterations,
            original_width: orig_w,
            original_height: orig_h,
        })
    }

    /// Decode `bytes` then `run`.
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<PreparedImage, ImageError> {
        let source = SourceImage::decode(bytes)?;
        self.run(&source)
    }
}
