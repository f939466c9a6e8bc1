//! Deterministic inpainters for tests.

use image::{GrayImage, Rgb, RgbImage};

use crate::error::FillError;
use crate::fill::Inpainter;

/// Paints every masked pixel with one colour.
pub struct SolidInpainter {
    color: Rgb<u8>,
}

impl SolidInpainter {
    pub fn new(color: Rgb<u8>) -> Self {
        Self { color }
    }
}

impl Inpainter for SolidInpainter {
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, FillError> {
        let mut out = image.clone();
        for (x, y, m) in mask.enumerate_pixels() {
            if m[0] > 0 {
                out.put_pixel(x, y, self.color);
            }
        }
        Ok(out)
    }
}

/// Always fails, like a model that could not be loaded.
pub struct FailingInpainter;

impl Inpainter for FailingInpainter {
    fn inpaint(&mut self, _image: &RgbImage, _mask: &GrayImage) -> Result<RgbImage, FillError> {
        Err(FillError::Unavailable("model offline".to_string()))
    }
}
