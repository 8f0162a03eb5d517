//! Pixel normalization and image ↔ array conversion

use crate::Result;
use image::{GrayImage, Luma};
use ndarray::{Array3, ArrayView2};
use std::path::Path;

const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// Map a pixel from [0, 255] to [-1, 1]
pub fn normalize(value: u8) -> f32 {
    (f32::from(value) / 255.0 - MEAN) / STD
}

/// Map a network output back to a pixel, clamping to [-1, 1] first
pub fn denormalize(value: f32) -> u8 {
    let v = if value.is_nan() { -1.0 } else { value.clamp(-1.0, 1.0) };
    ((v * STD + MEAN) * 255.0).round() as u8
}

/// Normalized `[1, H, W]` array of a grayscale image
pub fn image_to_array(image: &GrayImage) -> Array3<f32> {
    let (w, h) = image.dimensions();
    Array3::from_shape_fn((1, h as usize, w as usize), |(_, y, x)| {
        normalize(image.get_pixel(x as u32, y as u32)[0])
    })
}

/// Grayscale image from a normalized `[H, W]` plane
pub fn array_to_image(plane: ArrayView2<'_, f32>) -> GrayImage {
    let (h, w) = plane.dim();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        Luma([denormalize(plane[[y as usize, x as usize]])])
    })
}

/// Decode any supported image file as 8-bit grayscale
pub fn load_gray(path: &Path) -> Result<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}
