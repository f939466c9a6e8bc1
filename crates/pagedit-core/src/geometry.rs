//! Pixel-space rectangles.

use serde::{Deserialize, Serialize};

/// Axis-aligned edit target in page pixel coordinates.
///
/// A region may extend past the page edges; it is clamped with
/// [`Region::clamp`] before any pixel access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RegionRepr")]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Accepts both `{"x":..,"y":..,"width":..,"height":..}` and the
/// `[x, y, w, h]` bbox arrays emitted by detectors.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegionRepr {
    Bbox([f64; 4]),
    Fields {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl From<RegionRepr> for Region {
    fn from(repr: RegionRepr) -> Self {
        let [x, y, width, height] = match repr {
            RegionRepr::Bbox(b) => b,
            RegionRepr::Fields { x, y, width, height } => [x, y, width, height],
        };
        Region::from_f64(x, y, width, height)
    }
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from fractional coordinates, truncating toward zero.
    pub fn from_f64(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: x as i32,
            y: y as i32,
            width: width as i32,
            height: height as i32,
        }
    }

    /// Grow by `pad` pixels on every side.
    pub fn expand(&self, pad: u32) -> Self {
        let pad = pad.min(i32::MAX as u32 / 2) as i32;
        Self {
            x: self.x.saturating_sub(pad),
            y: self.y.saturating_sub(pad),
            width: self.width.saturating_add(pad.saturating_mul(2)),
            height: self.height.saturating_add(pad.saturating_mul(2)),
        }
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// Returns `None` when nothing of the region lies on the image or the
    /// region itself has a non-positive size.
    pub fn clamp(&self, width: u32, height: u32) -> Option<PixelRect> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        let x0 = i64::from(self.x).max(0);
        let y0 = i64::from(self.y).max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        })
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)` that lies on an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Iterate all `(x, y)` positions inside the rectangle.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clamp_inside() {
        let rect = Region::new(10, 20, 30, 40).clamp(100, 100).unwrap();
        assert_eq!(rect, PixelRect { x0: 10, y0: 20, x1: 40, y1: 60 });
        assert_eq!((rect.width(), rect.height()), (30, 40));
    }

    #[test]
    fn test_clamp_overhanging() {
        let rect = Region::new(-5, 90, 20, 20).clamp(100, 100).unwrap();
        assert_eq!(rect, PixelRect { x0: 0, y0: 90, x1: 15, y1: 100 });
    }

    #[test]
    fn test_clamp_empty() {
        assert_eq!(Region::new(0, 0, 0, 10).clamp(100, 100), None);
        assert_eq!(Region::new(0, 0, 10, -3).clamp(100, 100), None);
        assert_eq!(Region::new(150, 0, 10, 10).clamp(100, 100), None);
        assert_eq!(Region::new(-20, 0, 10, 10).clamp(100, 100), None);
    }

    #[test]
    fn test_expand() {
        assert_eq!(Region::new(10, 10, 20, 5).expand(5), Region::new(5, 5, 30, 15));
    }

    #[test]
    fn test_deserialize_bbox_and_fields() {
        let from_bbox: Region = serde_json::from_str("[50.7, 50.2, 200.0, 40.9]").unwrap();
        assert_eq!(from_bbox, Region::new(50, 50, 200, 40));

        let from_fields: Region =
            serde_json::from_str(r#"{"x": 1, "y": 2, "width": 3, "height": 4}"#).unwrap();
        assert_eq!(from_fields, Region::new(1, 2, 3, 4));
    }
}
