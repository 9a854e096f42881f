//! Unsharp-style edge enhancement, applied once after resizing on the
//! detection path only. Sharpening a poor capture amplifies its noise, so the
//! plain compression path never calls this.

use image::{Rgba, RgbaImage};

const CENTER_WEIGHT: f32 = 3.0;
const NEIGHBOR_WEIGHT: f32 = -0.5;

/// Convolve each colour channel with
/// `[[0, -0.5, 0], [-0.5, 3, -0.5], [0, -0.5, 0]]`.
///
/// The 1-pixel border is copied from the source unchanged. Output alpha is
/// always 255. Images smaller than 3×3 are returned as opaque copies.
pub fn sharpen(image: &RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = RgbaImage::from_fn(w, h, |x, y| {
        let p = image.get_pixel(x, y).0;
        Rgba([p[0], p[1], p[2], 255])
    });

    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = image.get_pixel(x, y).0;
            let top = image.get_pixel(x, y - 1).0;
            let bottom = image.get_pixel(x, y + 1).0;
            let left = image.get_pixel(x - 1, y).0;
            let right = image.get_pixel(x + 1, y).0;

            let mut px = [0u8, 0, 0, 255];
            for c in 0..3 {
                let neighbors = top[c] as f32 + bottom[c] as f32 + left[c] as f32 + right[c] as f32;
                let value = CENTER_WEIGHT * center[c] as f32 + NEIGHBOR_WEIGHT * neighbors;
                px[c] = value.round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x, y, Rgba(px));
        }
    }

    out
}
