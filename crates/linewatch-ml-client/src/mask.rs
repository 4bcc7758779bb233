//! Binary segmentation masks.

use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, ImageFormat, Luma};

use crate::error::{MlError, MlResult};

const SET: Luma<u8> = Luma([255]);
const CLEAR: Luma<u8> = Luma([0]);

/// Image-sized boolean mask. A pixel is either set ("defect") or clear.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMask {
    pixels: GrayImage,
}

impl SegmentMask {
    /// All-clear mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::from_pixel(width, height, CLEAR),
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        Self {
            pixels: GrayImage::from_fn(width, height, |x, y| if f(x, y) { SET } else { CLEAR }),
        }
    }

    /// Decode a PNG; any non-zero luma value counts as set.
    pub fn from_png_bytes(bytes: &[u8]) -> MlResult<Self> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_luma8();
        let (width, height) = decoded.dimensions();
        Ok(Self::from_fn(width, height, |x, y| decoded.get_pixel(x, y)[0] > 0))
    }

    /// Encode as an 8-bit grayscale PNG (0 or 255).
    pub fn to_png_bytes(&self) -> MlResult<Vec<u8>> {
        let mut buf = Vec::new();
        let (width, height) = self.dimensions();
        PngEncoder::new(&mut buf).write_image(self.pixels.as_raw(), width, height, ColorType::L8)?;
        Ok(buf)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.pixels
            .get_pixel_checked(x, y)
            .map(|p| p[0] > 0)
            .unwrap_or(false)
    }

    /// Number of set pixels.
    pub fn set_pixels(&self) -> u64 {
        self.pixels.pixels().filter(|p| p[0] > 0).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.set_pixels() == 0
    }

    /// Pixelwise OR of `other` into `self`.
    pub fn union_with(&mut self, other: &SegmentMask) -> MlResult<()> {
        if self.dimensions() != other.dimensions() {
            return Err(MlError::MaskMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        for (dst, src) in self.pixels.pixels_mut().zip(other.pixels.pixels()) {
            if src[0] > 0 {
                *dst = SET;
            }
        }
        Ok(())
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_is_pixelwise_or() {
        let mut left = SegmentMask::from_fn(4, 2, |x, _| x < 2);
        let right = SegmentMask::from_fn(4, 2, |x, y| x == 3 && y == 1);

        left.union_with(&right).unwrap();

        assert!(left.is_set(0, 0));
        assert!(left.is_set(1, 1));
        assert!(!left.is_set(2, 0));
        assert!(left.is_set(3, 1));
        assert!(!left.is_set(3, 0));
        assert_eq!(left.set_pixels(), 5);
    }

    #[test]
    fn test_union_rejects_mismatched_dimensions() {
        let mut left = SegmentMask::empty(4, 4);
        let right = SegmentMask::empty(4, 5);
        assert!(matches!(
            left.union_with(&right),
            Err(MlError::MaskMismatch { .. })
        ));
    }

    #[test]
    fn test_png_round_trip() {
        let mask = SegmentMask::from_fn(6, 3, |x, y| (x + y) % 2 == 0);
        let bytes = mask.to_png_bytes().unwrap();
        let decoded = SegmentMask::from_png_bytes(&bytes).unwrap();
        assert_eq!(decoded, mask);
    }

    #[test]
    fn test_out_of_bounds_is_clear() {
        let mask = SegmentMask::from_fn(2, 2, |_, _| true);
        assert!(!mask.is_set(2, 0));
        assert!(!SegmentMask::empty(2, 2).is_set(0, 0));
        assert!(SegmentMask::empty(2, 2).is_empty());
    }
}
