//! Region fill strategies.
//!
//! Erasing a region means repainting it with plausible background. Two
//! strategies exist and are selected per edit through [`FillStrategy`]:
//! - [`ContentAwareFill`] hands the page and a padded mask to an inpainting
//!   model and copies the reconstruction back into the region
//! - [`BorderAverageFill`] paints the region with an explicit colour or the
//!   mean colour of a thin ring around it

mod border;
mod content_aware;
mod lama;

pub use border::{BorderAverageFill, DEFAULT_BORDER_WIDTH, DEFAULT_FALLBACK_COLOR};
pub use content_aware::{ContentAwareFill, Inpainter};
pub use lama::LamaInpainter;

use std::str::FromStr;

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FillError, PageditError, Result};
use crate::geometry::{PixelRect, Region};
use crate::mask::RegionMask;

/// Which fill strategy an edit uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// Model-based reconstruction.
    #[default]
    #[serde(alias = "lama", alias = "inpaint")]
    ContentAware,
    /// Explicit colour or border-ring mean colour.
    #[serde(alias = "average", alias = "color", alias = "solid")]
    BorderAverage,
}

impl FillStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillStrategy::ContentAware => "content_aware",
            FillStrategy::BorderAverage => "border_average",
        }
    }
}

impl FromStr for FillStrategy {
    type Err = PageditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "content_aware" | "lama" | "inpaint" => Ok(FillStrategy::ContentAware),
            "border_average" | "average" | "color" | "solid" => Ok(FillStrategy::BorderAverage),
            other => Err(PageditError::InvalidEdit(format!("unknown fill strategy '{}'", other))),
        }
    }
}

impl std::fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a fill did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    pub strategy: FillStrategy,
    /// Clamped region that was repainted.
    pub rect: PixelRect,
    /// Paint colour, for border-average fills.
    pub color: Option<Rgb<u8>>,
}

/// Dispatches a fill request to the selected strategy.
#[derive(Clone)]
pub struct FillProvider {
    mask: RegionMask,
    border_average: BorderAverageFill,
    content_aware: Option<ContentAwareFill>,
}

impl FillProvider {
    pub fn new(mask: RegionMask, border_average: BorderAverageFill) -> Self {
        Self {
            mask,
            border_average,
            content_aware: None,
        }
    }

    /// Enable content-aware fill backed by a shared inpainter.
    pub fn with_content_aware(mut self, fill: ContentAwareFill) -> Self {
        self.content_aware = Some(fill);
        self
    }

    pub fn has_content_aware(&self) -> bool {
        self.content_aware.is_some()
    }

    /// Repaint `region` of `image` using `strategy`.
    ///
    /// `fill_color` only applies to [`FillStrategy::BorderAverage`]. On error
    /// `image` is left as it was.
    pub fn fill(
        &self,
        image: &mut RgbImage,
        region: &Region,
        strategy: FillStrategy,
        fill_color: Option<Rgb<u8>>,
    ) -> Result<FillOutcome> {
        let (width, height) = image.dimensions();
        let rect = region.clamp(width, height).ok_or_else(|| {
            PageditError::InvalidRegion(format!("{} is empty on a {}x{} page", region, width, height))
        })?;

        match strategy {
            FillStrategy::ContentAware => {
                let fill = self.content_aware.as_ref().ok_or_else(|| {
                    FillError::Unavailable("no inpainting model configured".to_string())
                })?;
                if fill_color.is_some() {
                    debug!("Ignoring fill colour for content-aware fill of {}", region);
                }
                let mask = self.mask.build(region, (width, height))?;
                fill.fill(image, &mask, rect)?;
                Ok(FillOutcome {
                    strategy,
                    rect,
                    color: None,
                })
            }
            FillStrategy::BorderAverage => {
                let color = self.border_average.fill(image, rect, fill_color);
                Ok(FillOutcome {
                    strategy,
                    rect,
                    color: Some(color),
                })
            }
        }
    }
}
