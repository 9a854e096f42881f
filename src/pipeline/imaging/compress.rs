//! Geometry and compression: shrink-to-fit with a minimum-dimension floor,
//! then a bounded greedy search for a JPEG quality that fits the byte budget.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use tracing::debug;

use super::types::{CompressionOptions, EncodedImage, SourceImage};
use super::ImageError;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Shorter side is never rendered below this.
pub const MIN_DIMENSION: u32 = 320;

/// Longer side is never rendered above this. A thin strip raised to the
/// floor would otherwise grow without bound.
pub const MAX_RENDER_DIMENSION: u32 = 4096;

/// Quality decrement per re-encode.
pub const QUALITY_STEP: f32 = 0.1;

/// Quality is never lowered past this.
pub const QUALITY_FLOOR: f32 = 0.4;

/// Upper bound on re-encodes after the initial one.
pub const MAX_COMPRESSION_ITERATIONS: u32 = 5;

// ═══════════════════════════════════════════════════════════
// Result types
// ═══════════════════════════════════════════════════════════

/// Output of the compression loop.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub image: EncodedImage,
    /// Quality the final bytes were encoded at.
    pub quality: f32,
    /// Number of re-encodes after the first attempt.
    pub iterations: u32,
}

impl CompressedImage {
    pub fn fits(&self, opts: &CompressionOptions) -> bool {
        self.image.len() <= opts.max_size_bytes()
    }
}

// ═══════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════

/// Target dimensions for an image of `width`×`height`.
///
/// Shrinks uniformly to fit inside `max_width`×`max_height` (never upscales
/// on that path), then, if the shorter side ends up under `MIN_DIMENSION`,
/// scales the original up uniformly so the shorter side equals it exactly.
pub fn compute_target_dimensions(width: u32, height: u32, opts: &CompressionOptions) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let scale = (opts.max_width as f64 / width as f64).min(opts.max_height as f64 / height as f64);
    let (mut w, mut h) = if scale < 1.0 {
        (
            ((width as f64 * scale).round() as u32).max(1),
            ((height as f64 * scale).round() as u32).max(1),
        )
    } else {
        (width, height)
    };

    if w.min(h) < MIN_DIMENSION {
        if width <= height {
            w = MIN_DIMENSION;
            h = (height as f64 * MIN_DIMENSION as f64 / width as f64).round() as u32;
        } else {
            h = MIN_DIMENSION;
            w = (width as f64 * MIN_DIMENSION as f64 / height as f64).round() as u32;
        }
    }

    (w, h)
}

/// `compute_target_dimensions`, refusing targets whose longer side would
/// exceed `MAX_RENDER_DIMENSION`.
pub fn checked_target_dimensions(
    width: u32,
    height: u32,
    opts: &CompressionOptions,
) -> Result<(u32, u32), ImageError> {
    let (w, h) = compute_target_dimensions(width, height, opts);
    if w.max(h) > MAX_RENDER_DIMENSION {
        debug!(
            source = format!("{width}x{height}"),
            target = format!("{w}x{h}"),
            "Aspect ratio too extreme to render"
        );
        return Err(ImageError::UnsupportedDimensions { width, height });
    }
    Ok((w, h))
}

/// Render `pixels` at the target dimensions for `opts` using cubic resampling.
pub fn render(pixels: &RgbaImage, opts: &CompressionOptions) -> Result<RgbaImage, ImageError> {
    let (w, h) = checked_target_dimensions(pixels.width(), pixels.height(), opts)?;
    if (w, h) == pixels.dimensions() {
        return Ok(pixels.clone());
    }
    Ok(image::imageops::resize(pixels, w, h, FilterType::CatmullRom))
}

// ═══════════════════════════════════════════════════════════
// Encoding
// ═══════════════════════════════════════════════════════════

/// Encode as JPEG. `quality` is 0.0–1.0; alpha is dropped.
pub fn encode_jpeg(pixels: &RgbaImage, quality: f32) -> Result<Vec<u8>, ImageError> {
    let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(q))
        .map_err(|e| ImageError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Encode at `opts.quality`, then step the quality down while the output is
/// over budget. Stops at whichever comes first: budget met, quality floor,
/// or `MAX_COMPRESSION_ITERATIONS`. The result may still exceed the budget.
pub fn compress_to_budget(
    pixels: &RgbaImage,
    opts: &CompressionOptions,
) -> Result<CompressedImage, ImageError> {
    let budget = opts.max_size_bytes();
    let mut quality = opts.quality.clamp(0.01, 1.0);
    let mut bytes = encode_jpeg(pixels, quality)?;
    let mut iterations = 0;

    while bytes.len() > budget && quality > QUALITY_FLOOR && iterations < MAX_COMPRESSION_ITERATIONS {
        quality = (quality - QUALITY_STEP).max(QUALITY_FLOOR);
        bytes = encode_jpeg(pixels, quality)?;
        iterations += 1;
    }

    debug!(
        size = bytes.len(),
        budget,
        quality,
        iterations,
        "Compression finished"
    );

    Ok(CompressedImage {
        image: EncodedImage {
            bytes,
            width: pixels.width(),
            height: pixels.height(),
        },
        quality,
        iterations,
    })
}

/// Decode, render to fit `opts`, and compress to the byte budget.
///
/// Decode failures surface as `ImageError::Decode`; the caller needs a fresh
/// source, retrying with the same bytes cannot succeed.
pub fn resize(bytes: &[u8], opts: &CompressionOptions) -> Result<CompressedImage, ImageError> {
    let source = SourceImage::decode(bytes)?;
    let rendered = render(&source.pixels, opts)?;
    compress_to_budget(&rendered, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba};

    fn noisy(width: u32, height: u32) -> RgbaImage {
        // Deterministic pseudo-random texture that JPEG cannot squeeze much.
        let mut state: u32 = 0x1234_5678;
        RgbaImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgba([a, b, c, 255])
        })
    }

    #[test]
    fn large_image_shrinks_to_fit() {
        let opts = CompressionOptions::default();
        assert_eq!(compute_target_dimensions(4000, 3000, &opts), (1024, 768));
        assert_eq!(compute_target_dimensions(3000, 4000, &opts), (768, 1024));
    }

    #[test]
    fn image_inside_box_is_not_upscaled() {
        let opts = CompressionOptions::default();
        assert_eq!(compute_target_dimensions(800, 600, &opts), (800, 600));
    }

    #[test]
    fn small_image_is_raised_to_floor() {
        let opts = CompressionOptions::default();
        assert_eq!(compute_target_dimensions(200, 100, &opts), (640, 320));
        assert_eq!(compute_target_dimensions(160, 240, &opts), (320, 480));
    }

    #[test]
    fn floor_wins_over_narrow_box() {
        // Box would shrink to 200 wide; floor pulls the short side back to 320.
        let opts = CompressionOptions {
            max_width: 200,
            max_height: 200,
            ..CompressionOptions::default()
        };
        let (w, h) = compute_target_dimensions(1000, 1000, &opts);
        assert_eq!((w, h), (320, 320));
    }

    #[test]
    fn shorter_side_never_below_floor() {
        let opts = CompressionOptions::default();
        for (w, h) in [(50, 50), (319, 2000), (5000, 100), (321, 321), (4000, 500)] {
            let (tw, th) = compute_target_dimensions(w, h, &opts);
            assert!(tw.min(th) >= MIN_DIMENSION, "{w}x{h} -> {tw}x{th}");
        }
    }

    #[test]
    fn thin_strip_is_refused_instead_of_inflated() {
        let opts = CompressionOptions::default();
        assert_eq!(compute_target_dimensions(1, 8000, &opts).0, MIN_DIMENSION);
        assert!(matches!(
            checked_target_dimensions(1, 8000, &opts),
            Err(ImageError::UnsupportedDimensions { width: 1, height: 8000 })
        ));
        // 320 × 12.8 is the widest strip that still fits.
        assert_eq!(checked_target_dimensions(25, 320, &opts).unwrap(), (320, 4096));
        assert!(checked_target_dimensions(24, 320, &opts).is_err());
    }

    #[test]
    fn resize_rejects_extreme_aspect_ratio_as_input_error() {
        let strip = SourceImage::from_pixels(noisy(1, 1000)).unwrap();
        let err = resize(&strip.encoded.bytes, &CompressionOptions::default()).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedDimensions { width: 1, height: 1000 }));
    }

    #[test]
    fn render_produces_target_dimensions() {
        let pixels = RgbaImage::from_pixel(100, 50, Rgba([20, 120, 40, 255]));
        let rendered = render(&pixels, &CompressionOptions::default()).unwrap();
        assert_eq!(rendered.dimensions(), (640, 320));
    }

    #[test]
    fn lower_quality_never_grows_output() {
        let pixels = noisy(256, 256);
        let high = encode_jpeg(&pixels, 0.9).unwrap();
        let mid = encode_jpeg(&pixels, 0.6).unwrap();
        let low = encode_jpeg(&pixels, 0.4).unwrap();
        assert!(high.len() >= mid.len());
        assert!(mid.len() >= low.len());
    }

    #[test]
    fn within_budget_needs_no_iterations() {
        let pixels = RgbaImage::from_pixel(320, 320, Rgba([90, 140, 60, 255]));
        let result = compress_to_budget(&pixels, &CompressionOptions::default()).unwrap();
        assert_eq!(result.iterations, 0);
        assert!((result.quality - 0.85).abs() < 1e-6);
        assert!(result.fits(&CompressionOptions::default()));
    }

    #[test]
    fn impossible_budget_stops_at_floor() {
        let opts = CompressionOptions {
            max_size_kb: 1,
            ..CompressionOptions::default()
        };
        let result = compress_to_budget(&noisy(512, 512), &opts).unwrap();
        assert!(result.iterations <= MAX_COMPRESSION_ITERATIONS);
        assert!((result.quality - QUALITY_FLOOR).abs() < 1e-6);
        assert!(!result.fits(&opts));
    }

    #[test]
    fn iteration_cap_applies_before_floor() {
        // Starting at 1.0 the floor is six steps away; the cap stops at five.
        let opts = CompressionOptions {
            quality: 1.0,
            max_size_kb: 1,
            ..CompressionOptions::default()
        };
        let result = compress_to_budget(&noisy(256, 256), &opts).unwrap();
        assert_eq!(result.iterations, MAX_COMPRESSION_ITERATIONS);
        assert!((result.quality - 0.5).abs() < 1e-4);
    }

    #[test]
    fn resize_decodes_and_compresses() {
        let source = SourceImage::from_pixels(noisy(1600, 1200)).unwrap();
        let result = resize(&source.encoded.bytes, &CompressionOptions::default()).unwrap();
        assert_eq!((result.image.width, result.image.height), (1024, 768));

        let decoded = image::load_from_memory(&result.image.bytes).unwrap();
        assert_eq!(decoded.width(), 1024);
    }

    #[test]
    fn resize_rejects_undecodable_source() {
        let err = resize(b"garbage bytes", &CompressionOptions::default()).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }
}
