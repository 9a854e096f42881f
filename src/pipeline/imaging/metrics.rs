//! Pixel metrics: brightness, contrast and sharpness.
//!
//! All metrics are pure functions of the pixel buffer. They run on a
//! centered square sample of at most `SAMPLE_SIZE` pixels per side instead
//! of the full-resolution photo; a go/no-go quality decision does not need
//! more than that.

use std::borrow::Cow;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use serde::Serialize;

/// Side of the square sample the metrics are computed on.
pub const SAMPLE_SIZE: u32 = 400;

/// Divisor that brings the Laplacian spread into a human-tunable range.
pub const SHARPNESS_NORMALIZATION: f64 = 10.0;

/// Brightness, contrast and sharpness of one image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PixelMetrics {
    /// Mean luma, 0–255.
    pub brightness: f32,
    /// Population standard deviation of luma.
    pub contrast: f32,
    /// Normalized spread of the Laplacian response.
    pub sharpness: f32,
}

/// Compute all three metrics on the centered sample of `image`.
pub fn measure(image: &RgbaImage) -> PixelMetrics {
    let sample = sample_region(image, SAMPLE_SIZE);
    let plane = luma_plane(&sample);
    let brightness = mean(&plane);

    PixelMetrics {
        brightness: brightness as f32,
        contrast: standard_deviation(&plane, brightness) as f32,
        sharpness: laplacian_sharpness(&plane, sample.width(), sample.height()) as f32,
    }
}

/// ITU-R BT.601 luma of one pixel. Alpha is ignored.
pub fn luma(pixel: &Rgba<u8>) -> f64 {
    0.299 * pixel.0[0] as f64 + 0.587 * pixel.0[1] as f64 + 0.114 * pixel.0[2] as f64
}

/// Row-major luma values, kept as floats so no precision is lost to rounding.
pub fn luma_plane(image: &RgbaImage) -> Vec<f64> {
    image.pixels().map(luma).collect()
}

/// Centered square crop, downsampled to `size` when larger.
/// Borrows when the image is already a square no larger than `size`.
pub fn sample_region(image: &RgbaImage, size: u32) -> Cow<'_, RgbaImage> {
    let (w, h) = image.dimensions();
    let side = w.min(h);
    if side == 0 {
        return Cow::Borrowed(image);
    }

    let cropped: Cow<'_, RgbaImage> = if w == h {
        Cow::Borrowed(image)
    } else {
        let x = (w - side) / 2;
        let y = (h - side) / 2;
        Cow::Owned(image::imageops::crop_imm(image, x, y, side, side).to_image())
    };

    if side <= size {
        return cropped;
    }

    Cow::Owned(image::imageops::resize(
        &*cropped,
        size,
        size,
        FilterType::Triangle,
    ))
}

/// Mean luma across the whole image, 0–255. Zero for an empty image.
pub fn compute_brightness(image: &RgbaImage) -> f64 {
    mean(&luma_plane(image))
}

/// RMS deviation of per-pixel luma from the mean brightness.
pub fn compute_contrast(image: &RgbaImage) -> f64 {
    let plane = luma_plane(image);
    let brightness = mean(&plane);
    standard_deviation(&plane, brightness)
}

/// Edge energy of the grayscale image.
///
/// Applies `[[0,-1,0],[-1,8,-1],[0,-1,0]]` to interior pixels only and
/// returns the spread (standard deviation) of the response divided by
/// `SHARPNESS_NORMALIZATION`. Flat regions give a constant response, so a
/// uniform image measures zero.
pub fn compute_sharpness(image: &RgbaImage) -> f64 {
    laplacian_sharpness(&luma_plane(image), image.width(), image.height())
}

fn laplacian_sharpness(plane: &[f64], width: u32, height: u32) -> f64 {
    let (w, h) = (width as usize, height as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut responses = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = plane[y * w + x];
            let top = plane[(y - 1) * w + x];
            let bottom = plane[(y + 1) * w + x];
            let left = plane[y * w + x - 1];
            let right = plane[y * w + x + 1];

            responses.push(8.0 * center - top - bottom - left - right);
        }
    }

    standard_deviation(&responses, mean(&responses)) / SHARPNESS_NORMALIZATION
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
