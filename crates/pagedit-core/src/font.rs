//! Font registry, resolution and glyph access.
//!
//! Families map to a fixed set of style variants. Regular always exists;
//! bold and italic exist only for some families, and no family ships a
//! combined bold-italic, so bold + italic renders as italic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use ab_glyph::{Font, FontArc, OutlinedGlyph, PxScale, ScaleFont, point};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FontError;

/// Weight variant of a font asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Slant variant of a font asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSlant {
    Upright,
    Italic,
}

/// A concrete font file in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FontAsset {
    pub family: &'static str,
    pub weight: FontWeight,
    pub slant: FontSlant,
    /// File name relative to the font directory.
    pub file: &'static str,
}

/// Registry entry for one family.
#[derive(Debug)]
pub struct FontFamily {
    pub name: &'static str,
    pub regular: &'static str,
    pub bold: Option<&'static str>,
    pub italic: Option<&'static str>,
}

impl FontFamily {
    fn asset(&self, weight: FontWeight, slant: FontSlant, file: &'static str) -> FontAsset {
        FontAsset {
            family: self.name,
            weight,
            slant,
            file,
        }
    }

    fn regular_asset(&self) -> FontAsset {
        self.asset(FontWeight::Regular, FontSlant::Upright, self.regular)
    }
}

/// Families available to edits. The first entry is the registry default.
pub static FONT_REGISTRY: &[FontFamily] = &[
    FontFamily {
        name: "NotoSansTC",
        regular: "NotoSansTC-Regular.ttf",
        bold: Some("NotoSansTC-Bold.ttf"),
        italic: None,
    },
    FontFamily {
        name: "Roboto",
        regular: "Roboto-Regular.ttf",
        bold: Some("Roboto-Bold.ttf"),
        italic: Some("Roboto-Italic.ttf"),
    },
    FontFamily {
        name: "NotoSerifTC",
        regular: "NotoSerifTC-Regular.ttf",
        bold: Some("NotoSerifTC-Bold.ttf"),
        italic: None,
    },
];

fn find_family(name: &str) -> Option<&'static FontFamily> {
    let wanted = name.trim();
    FONT_REGISTRY.iter().find(|f| f.name.eq_ignore_ascii_case(wanted))
}

/// Rendered extent of a string, relative to the draw origin.
///
/// The origin is the left edge at the ascender line, so `top` is usually
/// positive and is the distance from the origin down to the first inked row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBounds {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Whether `(x, y)` lies inside, right and bottom exclusive.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.left..self.right).contains(&x) && (self.top..self.bottom).contains(&y)
    }

    fn union(self, other: TextBounds) -> TextBounds {
        TextBounds {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

// Built-in block face proportions, in tenths of the font size.
const BLOCK_ADVANCE: i64 = 6;
const BLOCK_INSET: i64 = 1;
const BLOCK_TOP_DIVISOR: i64 = 4;

/// A loaded face, ready to measure and rasterize text.
#[derive(Clone)]
pub enum FontFace {
    /// TrueType/OpenType outlines.
    Outline(FontArc),
    /// Deterministic block glyphs used when no font file can be loaded.
    Builtin,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontFace::Outline(_) => f.write_str("FontFace::Outline"),
            FontFace::Builtin => f.write_str("FontFace::Builtin"),
        }
    }
}

impl FontFace {
    /// Parse a font from file bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        FontArc::try_from_vec(bytes)
            .map(FontFace::Outline)
            .map_err(|e| e.to_string())
    }

    /// Bounding box of `text` rendered at `size` pixels per em.
    ///
    /// Empty or all-whitespace text measures as zero.
    pub fn measure(&self, text: &str, size: u32) -> TextBounds {
        match self {
            FontFace::Outline(font) => outline_glyphs(font, text, size)
                .iter()
                .map(|g| {
                    let b = g.px_bounds();
                    TextBounds {
                        left: b.min.x.floor() as i32,
                        top: b.min.y.floor() as i32,
                        right: b.max.x.ceil() as i32,
                        bottom: b.max.y.ceil() as i32,
                    }
                })
                .reduce(TextBounds::union)
                .unwrap_or_default(),
            FontFace::Builtin => block_boxes(text, size)
                .reduce(TextBounds::union)
                .unwrap_or_default(),
        }
    }

    /// Visit covered pixels as `(x, y, coverage)` relative to the origin.
    ///
    /// Only pixels inside `clip` (same coordinates, right and bottom
    /// exclusive) are visited; glyphs wholly outside it are not rasterized.
    pub fn rasterize(&self, text: &str, size: u32, clip: TextBounds, mut plot: impl FnMut(i32, i32, f32)) {
        match self {
            FontFace::Outline(font) => {
                for glyph in outline_glyphs(font, text, size) {
                    let bounds = glyph.px_bounds();
                    if bounds.max.x <= clip.left as f32
                        || bounds.min.x >= clip.right as f32
                        || bounds.max.y <= clip.top as f32
                        || bounds.min.y >= clip.bottom as f32
                    {
                        continue;
                    }
                    let (ox, oy) = (bounds.min.x as i32, bounds.min.y as i32);
                    glyph.draw(|x, y, coverage| {
                        let (px, py) = (ox + x as i32, oy + y as i32);
                        if clip.contains(px, py) {
                            plot(px, py, coverage);
                        }
                    });
                }
            }
            FontFace::Builtin => {
                for b in block_boxes(text, size) {
                    for y in b.top.max(clip.top)..b.bottom.min(clip.bottom) {
                        for x in b.left.max(clip.left)..b.right.min(clip.right) {
                            plot(x, y, 1.0);
                        }
                    }
                }
            }
        }
    }
}

/// Pixel scale whose em square is `size` pixels.
fn px_scale(font: &FontArc, size: u32) -> PxScale {
    let size = size as f32;
    match font.units_per_em() {
        Some(units) if units > 0.0 => PxScale::from(size * font.height_unscaled() / units),
        _ => PxScale::from(size),
    }
}

fn outline_glyphs(font: &FontArc, text: &str, size: u32) -> Vec<OutlinedGlyph> {
    let scale = px_scale(font, size);
    let scaled = font.as_scaled(scale);
    let mut caret = point(0.0, scaled.ascent());
    let mut previous = None;
    let mut glyphs = Vec::new();

    for ch in text.chars().filter(|c| !c.is_control()) {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret.x += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, caret);
        caret.x += scaled.h_advance(id);
        previous = Some(id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            glyphs.push(outlined);
        }
    }
    glyphs
}

fn block_boxes(text: &str, size: u32) -> impl Iterator<Item = TextBounds> + '_ {
    let size = i64::from(size);
    text.chars()
        .filter(|c| !c.is_control())
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(move |(i, _)| {
            let pen = i as i64 * BLOCK_ADVANCE * size;
            let left = (pen + BLOCK_INSET * size) / 10;
            let right = (pen + (BLOCK_ADVANCE - BLOCK_INSET) * size + 9) / 10;
            TextBounds {
                left: left as i32,
                top: (size / BLOCK_TOP_DIVISOR) as i32,
                right: right as i32,
                bottom: size as i32,
            }
        })
}

/// Maps font requests to assets and loads faces.
pub struct FontResolver {
    font_dir: Option<PathBuf>,
    default_family: &'static FontFamily,
    faces: RwLock<HashMap<&'static str, FontFace>>,
}

impl FontResolver {
    /// Resolver loading font files from `font_dir`.
    ///
    /// An unknown `default_family` falls back to the registry default.
    pub fn new(font_dir: impl Into<PathBuf>, default_family: &str) -> Self {
        Self {
            font_dir: Some(font_dir.into()),
            default_family: Self::default_entry(default_family),
            faces: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver that never touches the filesystem and always yields the
    /// built-in block face.
    pub fn builtin() -> Self {
        Self {
            font_dir: None,
            default_family: &FONT_REGISTRY[0],
            faces: RwLock::new(HashMap::new()),
        }
    }

    fn default_entry(name: &str) -> &'static FontFamily {
        find_family(name).unwrap_or_else(|| {
            warn!("Default font family '{}' not in registry, using {}", name, FONT_REGISTRY[0].name);
            &FONT_REGISTRY[0]
        })
    }

    /// Pick the asset for a family and style. Never fails.
    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> FontAsset {
        let entry = find_family(family).unwrap_or_else(|| {
            debug!("{}, using {}", FontError::UnknownFamily(family.to_string()), self.default_family.name);
            self.default_family
        });

        if italic {
            if bold {
                debug!("Bold italic is not available, rendering {} as italic", entry.name);
            }
            if let Some(file) = entry.italic {
                return entry.asset(FontWeight::Regular, FontSlant::Italic, file);
            }
            // Families without an italic borrow the registry's italic face.
            return match FONT_REGISTRY.iter().find_map(|f| f.italic.map(|file| (f, file))) {
                Some((fallback, file)) => fallback.asset(FontWeight::Regular, FontSlant::Italic, file),
                None => entry.regular_asset(),
            };
        }

        if bold {
            if let Some(file) = entry.bold {
                return entry.asset(FontWeight::Bold, FontSlant::Upright, file);
            }
        }

        entry.regular_asset()
    }

    /// Load (or reuse) the face for an asset.
    ///
    /// A missing or corrupt file is logged and replaced by the built-in face
    /// so the edit still renders.
    pub fn load(&self, asset: &FontAsset) -> FontFace {
        if let Some(face) = self
            .faces
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(asset.file)
        {
            return face.clone();
        }

        let face = match &self.font_dir {
            None => FontFace::Builtin,
            Some(dir) => {
                let path = dir.join(asset.file);
                let loaded = std::fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(FontFace::from_bytes);
                match loaded {
                    Ok(face) => {
                        debug!("Loaded font {}", path.display());
                        face
                    }
                    Err(reason) => {
                        let err = FontError::Load {
                            path: path.display().to_string(),
                            reason,
                        };
                        warn!(kind = err.kind(), "{}, using built-in face", err);
                        FontFace::Builtin
                    }
                }
            }
        };

        self.faces
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(asset.file, face.clone());
        face
    }

    /// Resolve and load in one step.
    pub fn face_for(&self, family: &str, bold: bool, italic: bool) -> (FontAsset, FontFace) {
        let asset = self.resolve(family, bold, italic);
        let face = self.load(&asset);
        (asset, face)
    }
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_regular_and_bold() {
        let resolver = FontResolver::builtin();
        assert_eq!(resolver.resolve("Roboto", false, false).file, "Roboto-Regular.ttf");
        assert_eq!(resolver.resolve("roboto", true, false).file, "Roboto-Bold.ttf");
        assert_eq!(resolver.resolve("Roboto", true, false).weight, FontWeight::Bold);
    }

    #[test]
    fn test_italic_wins_over_bold() {
        let resolver = FontResolver::builtin();
        let asset = resolver.resolve("Roboto", true, true);
        assert_eq!(asset.file, "Roboto-Italic.ttf");
        assert_eq!(asset.weight, FontWeight::Regular);
        assert_eq!(asset.slant, FontSlant::Italic);
    }

    #[test]
    fn test_italic_fallback_for_family_without_italic() {
        let resolver = FontResolver::builtin();
        let asset = resolver.resolve("NotoSansTC", false, true);
        assert_eq!(asset.file, "Roboto-Italic.ttf");
        assert_eq!(asset.slant, FontSlant::Italic);
    }

    #[test]
    fn test_unknown_family_uses_default() {
        let resolver = FontResolver::new("/nonexistent", "NotoSerifTC");
        assert_eq!(resolver.resolve("Comic Sans", false, false).file, "NotoSerifTC-Regular.ttf");

        let resolver = FontResolver::new("/nonexistent", "Wingdings");
        assert_eq!(resolver.resolve("", true, false).file, "NotoSansTC-Bold.ttf");
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Roboto-Regular.ttf"), b"not a font").unwrap();
        let resolver = FontResolver::new(dir.path(), "Roboto");

        let (_, face) = resolver.face_for("Roboto", false, false);
        assert!(matches!(face, FontFace::Builtin));
        let (_, face) = resolver.face_for("NotoSansTC", true, false);
        assert!(matches!(face, FontFace::Builtin));
    }

    #[test]
    fn test_builtin_measure() {
        let face = FontFace::Builtin;
        assert_eq!(face.measure("", 20), TextBounds::default());
        assert_eq!(face.measure("   ", 20), TextBounds::default());
        assert_eq!(
            face.measure("ab", 10),
            TextBounds { left: 1, top: 2, right: 11, bottom: 10 }
        );
        // Interior spaces still advance the pen.
        assert_eq!(face.measure("a b", 10).right, 17);
    }

    #[test]
    fn test_builtin_rasterize_matches_measure() {
        let face = FontFace::Builtin;
        let bounds = face.measure("xy", 12);
        let mut min = (i32::MAX, i32::MAX);
        let mut max = (i32::MIN, i32::MIN);
        let everything = TextBounds { left: i32::MIN, top: i32::MIN, right: i32::MAX, bottom: i32::MAX };
        face.rasterize("xy", 12, everything, |x, y, c| {
            assert_eq!(c, 1.0);
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        });
        assert_eq!((min.0, min.1, max.0 + 1, max.1 + 1), (bounds.left, bounds.top, bounds.right, bounds.bottom));
    }

    #[test]
    fn test_builtin_rasterize_visits_only_clip() {
        let face = FontFace::Builtin;
        let clip = TextBounds { left: 0, top: 0, right: 30, bottom: 20 };
        let mut visited = 0;
        face.rasterize("Total", 100_000, clip, |x, y, _| {
            assert!(clip.contains(x, y), "{},{} outside clip", x, y);
            visited += 1;
        });
        // The first block starts at 10_000 px, so nothing is visible.
        assert_eq!(visited, 0);

        // "ab" at 20 covers x 2..10 and y 5..20; the clip keeps x 2..6.
        let clip = TextBounds { left: 0, top: 0, right: 6, bottom: 100 };
        let mut visited = 0;
        face.rasterize("ab", 20, clip, |_, _, _| visited += 1);
        assert_eq!(visited, 4 * 15);
    }
}
