//! Border-average fill.

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::geometry::PixelRect;

/// Default sampling ring width, in pixels.
pub const DEFAULT_BORDER_WIDTH: u32 = 3;

/// Colour used when there is nothing around the region to sample.
pub const DEFAULT_FALLBACK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Paints a region with a flat colour taken from its surroundings.
#[derive(Debug, Clone, Copy)]
pub struct BorderAverageFill {
    border_width: u32,
    fallback: Rgb<u8>,
}

impl BorderAverageFill {
    pub fn new() -> Self {
        Self {
            border_width: DEFAULT_BORDER_WIDTH,
            fallback: DEFAULT_FALLBACK_COLOR,
        }
    }

    /// Set the sampling ring width.
    pub fn with_border_width(mut self, border_width: u32) -> Self {
        self.border_width = border_width;
        self
    }

    /// Set the colour used when the ring has no pixels.
    pub fn with_fallback(mut self, fallback: Rgb<u8>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Mean colour of the ring around `rect`, or `None` if the ring is empty.
    ///
    /// The ring is `border_width` pixels wide, clamped to the image, and
    /// excludes the region's own pixels.
    pub fn sample(&self, image: &RgbImage, rect: PixelRect) -> Option<Rgb<u8>> {
        let (width, height) = image.dimensions();
        let outer = PixelRect {
            x0: rect.x0.saturating_sub(self.border_width),
            y0: rect.y0.saturating_sub(self.border_width),
            x1: rect.x1.saturating_add(self.border_width).min(width),
            y1: rect.y1.saturating_add(self.border_width).min(height),
        };

        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for (x, y) in outer.pixels().filter(|&(x, y)| !rect.contains(x, y)) {
            let pixel = image.get_pixel(x, y);
            for (sum, &value) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += u64::from(value);
            }
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let mean = |sum: u64| ((sum + count / 2) / count) as u8;
        Some(Rgb([mean(sums[0]), mean(sums[1]), mean(sums[2])]))
    }

    /// Paint `rect` and return the colour used.
    ///
    /// An explicit colour is used as-is; otherwise the ring mean, or the
    /// fallback when the region leaves no ring to sample.
    pub fn fill(&self, image: &mut RgbImage, rect: PixelRect, explicit: Option<Rgb<u8>>) -> Rgb<u8> {
        let color = match explicit {
            Some(color) => color,
            None => self.sample(image, rect).unwrap_or_else(|| {
                debug!("No border pixels around {:?}, using fallback colour", rect);
                self.fallback
            }),
        };

        for (x, y) in rect.pixels() {
            image.put_pixel(x, y, color);
        }
        color
    }
}

impl Default for BorderAverageFill {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uniform_white_background() {
        let mut image = RgbImage::from_pixel(400, 200, Rgb([255, 255, 255]));
        // Dark "text" inside the region.
        for x in 60..120 {
            for y in 55..85 {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let rect = Region::new(50, 50, 200, 40).clamp(400, 200).unwrap();
        let color = BorderAverageFill::new().fill(&mut image, rect, None);

        assert_eq!(color, Rgb([255, 255, 255]));
        assert!(rect.pixels().all(|(x, y)| image.get_pixel(x, y) == &Rgb([255, 255, 255])));
    }

    #[test]
    fn test_region_covering_image_uses_fallback() {
        let mut image = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let rect = Region::new(0, 0, 10, 10).clamp(10, 10).unwrap();
        let fill = BorderAverageFill::new();

        assert_eq!(fill.sample(&image, rect), None);
        assert_eq!(fill.fill(&mut image, rect, None), DEFAULT_FALLBACK_COLOR);
        assert_eq!(image.get_pixel(9, 9), &DEFAULT_FALLBACK_COLOR);
    }

    #[test]
    fn test_custom_fallback() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let rect = Region::new(-2, -2, 10, 10).clamp(4, 4).unwrap();
        let fill = BorderAverageFill::new().with_fallback(Rgb([128, 128, 128]));
        assert_eq!(fill.fill(&mut image, rect, None), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_ring_mean_excludes_interior() {
        // Left half red, right half blue; region straddles the seam.
        let mut image = RgbImage::from_fn(20, 10, |x, _| {
            if x < 10 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        for x in 8..12 {
            for y in 4..6 {
                image.put_pixel(x, y, Rgb([0, 255, 0]));
            }
        }
        let rect = Region::new(8, 4, 4, 2).clamp(20, 10).unwrap();
        let color = BorderAverageFill::new().with_border_width(1).sample(&image, rect).unwrap();
        // Ring is symmetric about the seam and contains no green.
        assert_eq!(color, Rgb([128, 0, 128]));
    }

    #[test]
    fn test_ring_clamped_at_edge() {
        let mut image = RgbImage::from_pixel(10, 10, Rgb([40, 40, 40]));
        let rect = Region::new(0, 0, 5, 10).clamp(10, 10).unwrap();
        let color = BorderAverageFill::new().fill(&mut image, rect, None);
        assert_eq!(color, Rgb([40, 40, 40]));
    }

    #[test]
    fn test_explicit_color_skips_sampling() {
        let mut image = RgbImage::from_pixel(10, 10, Rgb([40, 40, 40]));
        let rect = Region::new(2, 2, 3, 3).clamp(10, 10).unwrap();
        let color = BorderAverageFill::new().fill(&mut image, rect, Some(Rgb([1, 2, 3])));
        assert_eq!(color, Rgb([1, 2, 3]));
        assert_eq!(image.get_pixel(4, 4), &Rgb([1, 2, 3]));
        assert_eq!(image.get_pixel(5, 5), &Rgb([40, 40, 40]));
    }
}
