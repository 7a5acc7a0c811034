//! Synthetic images for unit tests.

use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Smooth, face-sized texture; different seeds give uncorrelated layouts.
pub fn pattern(width: u32, height: u32, seed: u32) -> GrayImage {
    let fx = 0.05 + 0.013 * (seed % 7) as f32;
    let fy = 0.07 + 0.011 * (seed % 5) as f32;
    let phase = seed as f32 * 1.7;
    GrayImage::from_fn(width, height, |x, y| {
        let u = x as f32 * 120.0 / width as f32;
        let v = y as f32 * 120.0 / height as f32;
        let value = 128.0
            + 60.0 * (u * fx + phase).sin() * (v * fy - phase).cos()
            + 40.0 * ((u + v) * 0.031 * (seed as f32 + 1.0)).sin();
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Uniform random noise from a fixed seed.
pub fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(width, height, |_, _| Luma([rng.gen::<u8>()]))
}
