//! Rasterising laid-out text onto page buffers.

use image::{Rgb, RgbImage};

use crate::font::{FontFace, TextBounds};
use crate::layout::TextLayout;

/// Draw `text` onto `image`, blending by glyph coverage.
///
/// `anchor` is the top-left of the box the layout was computed for. Pixels
/// falling outside the image are skipped. Returns how many pixels changed.
pub fn draw_text(
    image: &mut RgbImage,
    face: &FontFace,
    text: &str,
    layout: &TextLayout,
    anchor: (i32, i32),
    color: Rgb<u8>,
) -> usize {
    if text.is_empty() {
        return 0;
    }

    let (width, height) = image.dimensions();
    let ox = (anchor.0 as f32 + layout.origin.0).round() as i32;
    let oy = (anchor.1 as f32 + layout.origin.1).round() as i32;
    let mut changed = 0;

    // The image rectangle in glyph coordinates.
    let visible = TextBounds {
        left: ox.saturating_neg(),
        top: oy.saturating_neg(),
        right: (width.min(i32::MAX as u32) as i32).saturating_sub(ox),
        bottom: (height.min(i32::MAX as u32) as i32).saturating_sub(oy),
    };

    face.rasterize(text, layout.font_size, visible, |x, y, coverage| {
        let (px, py) = (ox.saturating_add(x), oy.saturating_add(y));
        if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height || coverage <= 0.0 {
            return;
        }
        let pixel = image.get_pixel_mut(px as u32, py as u32);
        let blended = blend(*pixel, color, coverage.min(1.0));
        if blended != *pixel {
            *pixel = blended;
            changed += 1;
        }
    });

    changed
}

fn blend(dst: Rgb<u8>, src: Rgb<u8>, alpha: f32) -> Rgb<u8> {
    let mix = |d: u8, s: u8| (d as f32 + (s as f32 - d as f32) * alpha).round().clamp(0.0, 255.0) as u8;
    Rgb([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2])])
}
