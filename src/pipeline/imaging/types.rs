use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use super::ImageError;

// ═══════════════════════════════════════════════════════════
// Image buffers
// ═══════════════════════════════════════════════════════════

/// Encoded image bytes with the dimensions they declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An image flowing through the pipeline: RGBA pixels plus an encoded form.
///
/// Stages never mutate a `SourceImage` in place; each one returns a new
/// value so every stage can be tested on its own.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: RgbaImage,
    pub encoded: EncodedImage,
}

impl SourceImage {
    /// Decode caller-supplied bytes (JPEG or PNG).
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Missing);
        }

        // Header only: refuse absurd sizes before the pixels are expanded.
        let (declared_w, declared_h) = image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| ImageError::Decode(e.to_string()))?;
        check_source_dimensions(declared_w, declared_h)?;

        let decoded =
            image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
        let (width, height) = decoded.dimensions();

        Ok(Self {
            pixels: decoded.to_rgba8(),
            encoded: EncodedImage {
                bytes: bytes.to_vec(),
                width,
                height,
            },
        })
    }

    /// Wrap already-rendered pixels, producing a lossless PNG encoded form.
    pub fn from_pixels(pixels: RgbaImage) -> Result<Self, ImageError> {
        let (width, height) = pixels.dimensions();
        let bytes = encode_png(&pixels)?;
        Ok(Self {
            pixels,
            encoded: EncodedImage {
                bytes,
                width,
                height,
            },
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Largest decoded source accepted, in pixels (50 MP).
pub const MAX_SOURCE_PIXELS: u64 = 50_000_000;

/// Reject empty or oversized sources by their declared dimensions.
pub fn check_source_dimensions(width: u32, height: u32) -> Result<(), ImageError> {
    if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_SOURCE_PIXELS {
        return Err(ImageError::UnsupportedDimensions { width, height });
    }
    Ok(())
}

/// Encode RGBA pixels as PNG bytes.
pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let dynamic = DynamicImage::ImageRgba8(pixels.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ImageError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Compression options
// ═══════════════════════════════════════════════════════════

/// Resize bounds and byte budget for the compression path.
///
/// A value object: call sites override individual fields with
/// struct-update syntax, the defaults are never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// Initial lossy quality, 0.0 – 1.0.
    pub quality: f32,
    #[serde(rename = "maxSizeKB")]
    pub max_size_kb: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
            quality: 0.85,
            max_size_kb: 500,
        }
    }
}

impl CompressionOptions {
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_kb as usize * 1024
    }
}
