//! Binary masks for content-aware fill.

use image::{GrayImage, Luma};

use crate::error::{PageditError, Result};
use crate::geometry::{PixelRect, Region};

/// Default dilation around a region, in pixels.
///
/// Detected boxes tend to clip ascenders, descenders and anti-aliased
/// edges; five pixels covers those without eating much background.
pub const DEFAULT_MASK_PADDING: u32 = 5;

/// Mask value marking a pixel for reconstruction.
pub const MASK_ACTIVE: u8 = 255;

/// Page-sized single-channel mask with one padded rectangle set active.
///
/// Only ever handed to an inpainter; never persisted.
#[derive(Debug, Clone)]
pub struct Mask {
    image: GrayImage,
    active: PixelRect,
}

impl Mask {
    /// Mask pixels, `MASK_ACTIVE` inside the padded region and 0 elsewhere.
    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Padded, clamped rectangle that is active.
    pub fn active_rect(&self) -> PixelRect {
        self.active
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Builds masks from regions.
#[derive(Debug, Clone, Copy)]
pub struct RegionMask {
    padding: u32,
}

impl RegionMask {
    pub fn new() -> Self {
        Self {
            padding: DEFAULT_MASK_PADDING,
        }
    }

    /// Set the dilation padding.
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Build a mask for `region` on an image of `image_size`.
    pub fn build(&self, region: &Region, image_size: (u32, u32)) -> Result<Mask> {
        let (width, height) = image_size;
        if region.clamp(width, height).is_none() {
            return Err(PageditError::InvalidRegion(format!(
                "{} does not overlap the {}x{} page",
                region, width, height
            )));
        }

        // The unpadded region overlaps the page, so the padded one does too.
        let active = region
            .expand(self.padding)
            .clamp(width, height)
            .ok_or_else(|| PageditError::InvalidRegion(region.to_string()))?;

        let mut image = GrayImage::new(width, height);
        for (x, y) in active.pixels() {
            image.put_pixel(x, y, Luma([MASK_ACTIVE]));
        }

        Ok(Mask { image, active })
    }
}

impl Default for RegionMask {
    fn default() -> Self {
        Self::new()
    }
}
