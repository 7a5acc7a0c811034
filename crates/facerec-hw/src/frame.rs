//! Frame type and raw pixel-format conversion to grayscale.

use image::{GrayImage, ImageFormat};

/// A grayscale frame from a [`FrameSource`](crate::source::FrameSource).
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: GrayImage,
    pub sequence: u32,
}

impl Frame {
    pub fn new(image: GrayImage, sequence: u32) -> Self {
        Self { image, sequence }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

fn gray_image(width: u32, height: u32, data: Vec<u8>) -> Result<GrayImage, FrameError> {
    let expected = (width * height) as usize;
    let actual = data.len();
    GrayImage::from_raw(width, height, data).ok_or(FrameError::InvalidLength { expected, actual })
}

/// Extract the Y channel of packed YUYV 4:2:2 (`[Y0, U, Y1, V]` per pixel pair).
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<GrayImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    gray_image(width, height, yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Copy 8-bit grayscale.
pub fn grey_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<GrayImage, FrameError> {
    let expected = (width * height) as usize;
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    gray_image(width, height, buf[..expected].to_vec())
}

/// Reduce 16-bit little-endian grayscale to its high byte.
pub fn y16_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<GrayImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    gray_image(width, height, buf[..expected].chunks_exact(2).map(|px| px[1]).collect())
}

/// Decode one motion-JPEG frame to grayscale.
pub fn mjpeg_to_grayscale(buf: &[u8]) -> Result<GrayImage, FrameError> {
    Ok(image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::io::Cursor;

    #[test]
    fn test_yuyv_to_grayscale() {
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray.as_raw(), &vec![100, 200]);
    }

    #[test]
    fn test_yuyv_to_grayscale_4x2() {
        let yuyv: Vec<u8> = (0..16).collect();
        let gray = yuyv_to_grayscale(&yuyv, 4, 2).unwrap();
        assert_eq!(gray.dimensions(), (4, 2));
        assert_eq!(gray.as_raw(), &vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let result = yuyv_to_grayscale(&[100, 128], 2, 1);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_grey_ignores_trailing_bytes() {
        let gray = grey_to_grayscale(&[1, 2, 3, 4, 99], 2, 2).unwrap();
        assert_eq!(gray.as_raw(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_y16_keeps_high_byte() {
        // 0x1234, 0xABCD little-endian
        let gray = y16_to_grayscale(&[0x34, 0x12, 0xCD, 0xAB], 2, 1).unwrap();
        assert_eq!(gray.as_raw(), &vec![0x12, 0xAB]);
    }

    #[test]
    fn test_y16_invalid_length() {
        assert!(y16_to_grayscale(&[0; 3], 2, 1).is_err());
    }

    #[test]
    fn test_mjpeg_roundtrip_dimensions() {
        let src = GrayImage::from_fn(32, 24, |x, y| Luma([(x * 4 + y) as u8]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageLuma8(src)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let gray = mjpeg_to_grayscale(&jpeg).unwrap();
        assert_eq!(gray.dimensions(), (32, 24));
    }

    #[test]
    fn test_mjpeg_garbage_fails() {
        assert!(matches!(
            mjpeg_to_grayscale(b"not a jpeg"),
            Err(FrameError::Decode(_))
        ));
    }
}
