//! Edit requests as submitted by callers.

use image::Rgb;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PageditError, Result};
use crate::fill::FillStrategy;
use crate::geometry::Region;
use crate::layout::SizeOverride;

pub const DEFAULT_FONT_FAMILY: &str = "NotoSansTC";
pub const DEFAULT_TEXT_COLOR: &str = "#000000";

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}

/// Percentage as sent by clients: `150`, `"150"` or `"150%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontSizePercent {
    Number(f64),
    Text(String),
}

impl FontSizePercent {
    /// Ratio to apply to the fitting box; anything unusable reads as 1.0.
    pub fn ratio(&self) -> f32 {
        let percent = match self {
            FontSizePercent::Number(n) => Some(*n),
            FontSizePercent::Text(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        };
        match percent {
            Some(p) if p.is_finite() && p > 0.0 => (p / 100.0) as f32,
            _ => {
                warn!("Ignoring font size percent {:?}", self);
                1.0
            }
        }
    }
}

/// One region erase-and-replace request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    /// Target box in page pixels.
    #[serde(alias = "bbox")]
    pub region: Region,

    /// Replacement text; empty erases only.
    #[serde(default)]
    pub text: String,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Absolute size in pixels; wins over `font_size_percent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_percent: Option<FontSizePercent>,

    #[serde(default, alias = "is_bold")]
    pub bold: bool,

    #[serde(default, alias = "is_italic")]
    pub italic: bool,

    /// `#rrggbb` or `#rgb`.
    #[serde(default = "default_text_color")]
    pub text_color: String,

    /// Falls back to the configured default when absent.
    #[serde(default, alias = "inpaint_method", skip_serializing_if = "Option::is_none")]
    pub fill_strategy: Option<FillStrategy>,

    /// Explicit paint colour for border-average fill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,

    /// Start from the backup instead of the current page.
    #[serde(default)]
    pub restore_first: bool,
}

impl EditRequest {
    pub fn new(region: Region, text: impl Into<String>) -> Self {
        Self {
            region,
            text: text.into(),
            font_family: default_font_family(),
            font_size: None,
            font_size_percent: None,
            bold: false,
            italic: false,
            text_color: default_text_color(),
            fill_strategy: None,
            fill_color: None,
            restore_first: false,
        }
    }

    /// Erase-only request.
    pub fn erase(region: Region) -> Self {
        Self::new(region, "")
    }

    pub fn with_font(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn with_style(mut self, bold: bool, italic: bool) -> Self {
        self.bold = bold;
        self.italic = italic;
        self
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn with_font_size_percent(mut self, percent: f64) -> Self {
        self.font_size_percent = Some(FontSizePercent::Number(percent));
        self
    }

    pub fn with_text_color(mut self, color: impl Into<String>) -> Self {
        self.text_color = color.into();
        self
    }

    pub fn with_fill(mut self, strategy: FillStrategy) -> Self {
        self.fill_strategy = Some(strategy);
        self
    }

    pub fn with_fill_color(mut self, color: impl Into<String>) -> Self {
        self.fill_color = Some(color.into());
        self
    }

    pub fn with_restore_first(mut self, restore_first: bool) -> Self {
        self.restore_first = restore_first;
        self
    }

    /// Size requested by the caller, if any.
    pub fn size_override(&self) -> Option<SizeOverride> {
        match (self.font_size, &self.font_size_percent) {
            (Some(px), _) => Some(SizeOverride::Absolute(px)),
            (None, Some(percent)) => Some(SizeOverride::percent(percent.ratio())),
            (None, None) => None,
        }
    }

    /// Text colour, black if unparseable.
    pub fn text_rgb(&self) -> Rgb<u8> {
        parse_hex_color(&self.text_color).unwrap_or_else(|| {
            warn!("Invalid text colour '{}', using black", self.text_color);
            Rgb([0, 0, 0])
        })
    }

    /// Explicit fill colour. An unparseable colour is rejected.
    pub fn fill_rgb(&self) -> Result<Option<Rgb<u8>>> {
        self.fill_color
            .as_deref()
            .map(|c| {
                parse_hex_color(c)
                    .ok_or_else(|| PageditError::InvalidEdit(format!("invalid fill colour '{}'", c)))
            })
            .transpose()
    }
}

/// Parse `#rrggbb`, `#rgb` or the same without `#`.
pub fn parse_hex_color(s: &str) -> Option<Rgb<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
        }
        3 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Rgb([channel(0)?, channel(1)?, channel(2)?]))
        }
        _ => None,
    }
}
