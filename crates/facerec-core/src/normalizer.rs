//! Face normalization: resize to the canonical square, then equalize.

use crate::types::{CanonicalFace, CANONICAL_SIZE};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("cannot normalize an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Reduce a grayscale face crop to its [`CanonicalFace`].
///
/// Resizes to 120×120 with bilinear interpolation, then applies global
/// histogram equalization. Deterministic for identical input pixels.
pub fn normalize(face: &GrayImage) -> Result<CanonicalFace, NormalizeError> {
    let (width, height) = face.dimensions();
    if width == 0 || height == 0 {
        return Err(NormalizeError::EmptyImage { width, height });
    }

    let resized = resize_bilinear(face, CANONICAL_SIZE, CANONICAL_SIZE);
    Ok(CanonicalFace::from_normalized(equalize_histogram(&resized)))
}

/// Resize with a triangle (bilinear) filter. Same-size requests return a copy.
pub fn resize_bilinear(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Global histogram equalization.
///
/// The first occupied intensity maps to 0 and the cumulative count of every
/// later intensity is stretched over 0–255. An image holding a single
/// intensity is returned unchanged.
pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let pixels = image.as_raw();
    let total = pixels.len();
    if total == 0 {
        return image.clone();
    }

    let mut hist = [0u32; 256];
    for &p in pixels {
        hist[p as usize] += 1;
    }

    let Some(first) = hist.iter().position(|&count| count > 0) else {
        return image.clone();
    };
    if hist[first] as usize == total {
        return GrayImage::from_pixel(image.width(), image.height(), Luma([first as u8]));
    }

    let scale = 255.0 / (total as f32 - hist[first] as f32);
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for i in (first + 1)..256 {
        cumulative += hist[i];
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }

    let mut out = image.clone();
    for p in out.iter_mut() {
        *p = lut[*p as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pattern;

    #[test]
    fn test_normalize_downscale_shape() {
        let face = normalize(&pattern(640, 480, 1)).unwrap();
        assert_eq!(face.image().dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
    }

    #[test]
    fn test_normalize_upscale_shape() {
        let face = normalize(&pattern(31, 47, 2)).unwrap();
        assert_eq!(face.image().dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
    }

    #[test]
    fn test_normalize_single_pixel() {
        let face = normalize(&GrayImage::from_pixel(1, 1, Luma([77]))).unwrap();
        assert_eq!(face.image().dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
        assert!(face.image().pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn test_normalize_empty_fails() {
        let result = normalize(&GrayImage::new(0, 10));
        assert!(matches!(
            result,
            Err(NormalizeError::EmptyImage { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_normalize_deterministic() {
        let src = pattern(200, 150, 3);
        assert_eq!(normalize(&src).unwrap(), normalize(&src).unwrap());
    }

    #[test]
    fn test_equalize_stretches_low_contrast() {
        // Values 100..=110 only
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([100 + ((x + y * 16) % 11) as u8]));
        let eq = equalize_histogram(&img);
        let min = eq.pixels().map(|p| p[0]).min().unwrap();
        let max = eq.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_equalize_preserves_order() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([10 + x as u8 * 5]));
        let eq = equalize_histogram(&img);
        let values: Vec<u8> = eq.pixels().map(|p| p[0]).collect();
        // Four equally populated bins: 0, 1/3, 2/3, 1 of the range
        assert_eq!(values, vec![0, 85, 170, 255]);
    }

    #[test]
    fn test_equalize_constant_image_unchanged() {
        let img = GrayImage::from_pixel(8, 8, Luma([42]));
        assert_eq!(equalize_histogram(&img), img);
    }

    #[test]
    fn test_resize_same_size_is_copy() {
        let img = pattern(120, 120, 4);
        assert_eq!(resize_bilinear(&img, 120, 120), img);
    }
}
