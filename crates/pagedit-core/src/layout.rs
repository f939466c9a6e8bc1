//! Font-size fitting and text placement.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::font::{FontFace, TextBounds};
use crate::models::config::LayoutConfig;

/// Largest font size drawn, in multiples of the page height.
pub const PAGE_HEIGHT_CAP: u32 = 2;

/// Caller-supplied size in place of the autosized one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeOverride {
    /// Font size in pixels.
    Absolute(u32),
    /// Ratio applied to the fitting box (`1.5` is 150%).
    Percent(f32),
}

impl SizeOverride {
    /// Percent override, with non-finite or non-positive ratios read as 100%.
    pub fn percent(ratio: f32) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            SizeOverride::Percent(ratio)
        } else {
            SizeOverride::Percent(1.0)
        }
    }
}

/// Result of fitting text into a box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextLayout {
    /// Chosen font size in pixels.
    pub font_size: u32,
    /// Draw origin relative to the box's top-left corner.
    pub origin: (f32, f32),
    /// Text extent relative to the draw origin.
    pub bounds: TextBounds,
}

/// Chooses font sizes and centred origins for text boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLayoutEngine {
    config: LayoutConfig,
}

impl TextLayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    fn min_size(&self) -> u32 {
        self.config.min_font_size.max(1)
    }

    /// Largest size (roughly) at which `text` fits a `target_width` x
    /// `target_height` box, never below the configured minimum.
    pub fn autosize(&self, text: &str, target_width: f32, target_height: f32, face: &FontFace) -> u32 {
        let min = self.min_size();
        let estimate = floor_at(target_height * self.config.height_ratio, min);

        let measured = face.measure(text, estimate).width();
        if measured as f32 > target_width {
            let scale = target_width / measured as f32;
            let shrunk = floor_at(estimate as f32 * scale * self.config.width_margin, min);
            trace!("Shrinking {} -> {} to fit width {}", estimate, shrunk, target_width);
            shrunk
        } else {
            estimate
        }
    }

    /// Pick a font size for `text` and the origin that centres its glyphs in
    /// the `target_width` x `target_height` box.
    ///
    /// A percent override re-runs the fit against the scaled box; the origin
    /// is always centred in the unscaled box.
    pub fn fit(
        &self,
        text: &str,
        target_width: u32,
        target_height: u32,
        face: &FontFace,
        size: Option<SizeOverride>,
    ) -> TextLayout {
        let font_size = self.choose_size(text, target_width, target_height, face, size);
        self.place(text, target_width, target_height, face, font_size)
    }

    /// [`fit`](Self::fit) for a box on a page `page_height` pixels tall.
    ///
    /// The size is capped at [`PAGE_HEIGHT_CAP`] page heights, however large
    /// the requested size or the box.
    pub fn fit_on_page(
        &self,
        text: &str,
        target_width: u32,
        target_height: u32,
        face: &FontFace,
        size: Option<SizeOverride>,
        page_height: u32,
    ) -> TextLayout {
        let ceiling = page_height.saturating_mul(PAGE_HEIGHT_CAP).max(self.min_size());
        let chosen = self.choose_size(text, target_width, target_height, face, size);
        if chosen > ceiling {
            debug!("Capping font size {} at {} for a {}px page", chosen, ceiling, page_height);
        }
        self.place(text, target_width, target_height, face, chosen.min(ceiling))
    }

    fn choose_size(
        &self,
        text: &str,
        target_width: u32,
        target_height: u32,
        face: &FontFace,
        size: Option<SizeOverride>,
    ) -> u32 {
        let (width, height) = (target_width as f32, target_height as f32);
        match size {
            None => self.autosize(text, width, height, face),
            Some(SizeOverride::Absolute(px)) => px.max(self.min_size()),
            Some(SizeOverride::Percent(ratio)) => {
                let ratio = match SizeOverride::percent(ratio) {
                    SizeOverride::Percent(r) => r,
                    SizeOverride::Absolute(_) => 1.0,
                };
                self.autosize(text, width * ratio, height * ratio, face)
            }
        }
    }

    fn place(&self, text: &str, target_width: u32, target_height: u32, face: &FontFace, font_size: u32) -> TextLayout {
        let (width, height) = (target_width as f32, target_height as f32);
        let bounds = face.measure(text, font_size);
        let origin = (
            (width - bounds.width() as f32) / 2.0 - bounds.left as f32,
            (height - bounds.height() as f32) / 2.0 - bounds.top as f32,
        );

        TextLayout {
            font_size,
            origin,
            bounds,
        }
    }
}

fn floor_at(value: f32, min: u32) -> u32 {
    if value.is_finite() && value > min as f32 {
        // Saturating cast keeps absurd boxes bounded.
        value.floor() as u32
    } else {
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> TextLayoutEngine {
        TextLayoutEngine::default()
    }

    #[test]
    fn test_autosize_from_height() {
        // 50 * 0.8 = 40; "Hi" at 40px is 40px wide, well under 400.
        let layout = engine().fit("Hi", 400, 50, &FontFace::Builtin, None);
        assert_eq!(layout.font_size, 40);
    }

    #[test]
    fn test_autosize_shrinks_to_width() {
        let face = FontFace::Builtin;
        let layout = engine().fit("Hello world", 100, 50, &face, None);
        // 40px measures 256 wide: floor(40 * 100/256 * 0.95) = 14.
        assert_eq!(face.measure("Hello world", 40).width(), 256);
        assert_eq!(layout.font_size, 14);

        let layout = engine().fit("Hello", 100, 50, &face, None);
        // 40px measures 112 wide: floor(40 * 100/112 * 0.95) = 33.
        assert_eq!(layout.font_size, 33);
        assert!(face.measure("Hello", 33).width() <= 100);
    }

    #[test]
    fn test_minimum_size() {
        let layout = engine().fit("x", 100, 4, &FontFace::Builtin, None);
        assert_eq!(layout.font_size, 10);
        let layout = engine().fit("x", 100, 40, &FontFace::Builtin, Some(SizeOverride::Absolute(3)));
        assert_eq!(layout.font_size, 10);
        let layout = engine().fit("x", 100, 40, &FontFace::Builtin, Some(SizeOverride::Absolute(64)));
        assert_eq!(layout.font_size, 64);
    }

    #[test]
    fn test_width_monotonicity() {
        let face = FontFace::Builtin;
        let mut previous = 0;
        for width in (5..600).step_by(5) {
            let size = engine().fit("Invoice total", width, 60, &face, None).font_size;
            assert!(size >= previous, "width {} gave {} after {}", width, size, previous);
            previous = size;
        }
    }

    #[test]
    fn test_percent_scales_fitting_box() {
        let face = FontFace::Builtin;
        for text in ["Hi", "Hello", "A longer replacement line"] {
            let scaled = engine().fit(text, 100, 50, &face, Some(SizeOverride::Percent(2.0)));
            let direct = engine().fit(text, 200, 100, &face, None);
            assert_eq!(scaled.font_size, direct.font_size, "text {:?}", text);
        }
    }

    #[test]
    fn test_percent_applies_to_box_not_minimum() {
        let face = FontFace::Builtin;
        let base = engine().fit("Hi", 200, 10, &face, None);
        assert_eq!(base.font_size, 10);

        // 15 * 0.8 = 12, not 10 * 1.5 = 15.
        let scaled = engine().fit("Hi", 200, 10, &face, Some(SizeOverride::Percent(1.5)));
        assert_eq!(scaled.font_size, 12);
    }

    #[test]
    fn test_invalid_percent_is_identity() {
        let face = FontFace::Builtin;
        let base = engine().fit("Hello", 120, 40, &face, None);
        for ratio in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            let layout = engine().fit("Hello", 120, 40, &face, Some(SizeOverride::Percent(ratio)));
            assert_eq!(layout.font_size, base.font_size);
        }
    }

    #[test]
    fn test_origin_centres_glyph_box() {
        let face = FontFace::Builtin;
        let layout = engine().fit("ab", 100, 50, &face, Some(SizeOverride::Absolute(20)));
        // Glyph box at 20px: left 2, top 5, right 22, bottom 20.
        assert_eq!(layout.bounds, TextBounds { left: 2, top: 5, right: 22, bottom: 20 });
        assert_eq!(layout.origin, (38.0, 12.5));

        let left = layout.origin.0 + layout.bounds.left as f32;
        let right = 100.0 - (layout.origin.0 + layout.bounds.right as f32);
        assert_eq!(left, right);
        let top = layout.origin.1 + layout.bounds.top as f32;
        let bottom = 50.0 - (layout.origin.1 + layout.bounds.bottom as f32);
        assert_eq!(top, bottom);
    }

    #[test]
    fn test_empty_text_still_lays_out() {
        let layout = engine().fit("", 200, 40, &FontFace::Builtin, None);
        assert_eq!(layout.font_size, 32);
        assert_eq!(layout.bounds, TextBounds::default());
        assert_eq!(layout.origin, (100.0, 20.0));
    }

    #[test]
    fn test_fit_on_page_caps_size() {
        let face = FontFace::Builtin;
        let layout = engine().fit_on_page("Total", 120, 40, &face, Some(SizeOverride::Absolute(40_000)), 200);
        assert_eq!(layout.font_size, 400);

        let layout = engine().fit_on_page("Total", 120, 40, &face, Some(SizeOverride::percent(5_000.0)), 200);
        assert_eq!(layout.font_size, 400);

        // Oversized boxes are capped the same way.
        let layout = engine().fit_on_page("Hi", 1_000_000, 1_000_000, &face, None, 300);
        assert_eq!(layout.font_size, 600);

        // Ordinary requests are untouched.
        let capped = engine().fit_on_page("Hello", 100, 50, &face, None, 200);
        assert_eq!(capped, engine().fit("Hello", 100, 50, &face, None));
        let tiny_page = engine().fit_on_page("x", 100, 40, &face, Some(SizeOverride::Absolute(3)), 2);
        assert_eq!(tiny_page.font_size, 10);
    }
}
