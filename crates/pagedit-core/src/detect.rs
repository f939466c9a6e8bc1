//! Text detection on page images.
//!
//! Detection only suggests regions and text; callers may pass a block
//! straight into an [`EditRequest`](crate::models::edit::EditRequest) or
//! ignore it.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DetectError, Result};
use crate::geometry::Region;
use crate::models::edit::EditRequest;
use crate::storage::{PageId, PageStorage};

/// A detected run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedBlock {
    /// Position in reading order.
    pub id: usize,
    pub text: String,
    /// Axis-aligned hull of the detected quadrilateral.
    #[serde(alias = "bbox")]
    pub region: Region,
    /// Rounded to four decimal places.
    pub confidence: f32,
}

impl DetectedBlock {
    /// Edit replacing this block's text with `text`.
    pub fn to_edit(&self, text: impl Into<String>) -> EditRequest {
        EditRequest::new(self.region, text)
    }
}

/// Finds text on a page image.
pub trait TextDetector {
    fn detect(&self, image: &RgbImage) -> std::result::Result<Vec<DetectedBlock>, DetectError>;
}

/// Run a detector on a stored page.
pub fn detect_page(detector: &dyn TextDetector, storage: &dyn PageStorage, page: &PageId) -> Result<Vec<DetectedBlock>> {
    let image = storage.load_page(page)?;
    let blocks = detector.detect(&image)?;
    debug!("Detected {} text blocks on {}", blocks.len(), page);
    Ok(blocks)
}

/// Round a confidence score to four decimal places.
pub fn round_confidence(confidence: f32) -> f32 {
    (confidence * 10_000.0).round() / 10_000.0
}

/// Axis-aligned hull of a set of points.
pub fn hull(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Region> {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut any = false;
    for (x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
        any = true;
    }
    any.then(|| Region::from_f64(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Sort blocks top-to-bottom in 20px bands, then left-to-right, and number
/// them in that order.
pub fn reading_order(mut blocks: Vec<DetectedBlock>) -> Vec<DetectedBlock> {
    blocks.sort_by_key(|b| (b.region.y / 20, b.region.x));
    for (id, block) in blocks.iter_mut().enumerate() {
        block.id = id;
    }
    blocks
}

/// Fixed blocks for offline demos and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDetector;

impl TextDetector for MockDetector {
    fn detect(&self, image: &RgbImage) -> std::result::Result<Vec<DetectedBlock>, DetectError> {
        debug!("Mock detection on {}x{} image", image.width(), image.height());
        Ok((0..5)
            .map(|i| DetectedBlock {
                id: i,
                text: format!("Mock Text Block {}", i),
                region: Region::new(100, 100 + i as i32 * 60, 300, 50),
                confidence: 0.95,
            })
            .collect())
    }
}

#[cfg(feature = "native")]
pub use ocr::OcrDetector;

#[cfg(feature = "native")]
mod ocr {
    use std::path::Path;
    use std::time::Instant;

    use image::{DynamicImage, RgbImage};
    use tracing::{debug, info};

    use super::{DetectedBlock, TextDetector, hull, reading_order, round_confidence};
    use crate::error::DetectError;
    use crate::models::config::ModelConfig;

    /// Detector backed by `pure-onnx-ocr` (PaddleOCR detection + recognition).
    pub struct OcrDetector {
        engine: pure_onnx_ocr::engine::OcrEngine,
    }

    impl OcrDetector {
        /// Load the detection, recognition and dictionary files named in `config`.
        pub fn from_config(config: &ModelConfig) -> Result<Self, DetectError> {
            let dir = &config.model_dir;
            Self::from_files(
                &dir.join(&config.detection_model),
                &dir.join(&config.recognition_model),
                &dir.join(&config.dictionary),
            )
        }

        pub fn from_files(det: &Path, rec: &Path, dictionary: &Path) -> Result<Self, DetectError> {
            for path in [det, rec, dictionary] {
                if !path.is_file() {
                    return Err(DetectError::ModelLoad(format!("missing {}", path.display())));
                }
            }

            let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
                .det_model_path(det)
                .rec_model_path(rec)
                .dictionary_path(dictionary)
                .build()
                .map_err(|e| DetectError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

            info!("Loaded OCR models from {}", det.parent().unwrap_or(det).display());
            Ok(Self { engine })
        }
    }

    impl TextDetector for OcrDetector {
        fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedBlock>, DetectError> {
            let start = Instant::now();
            let image = DynamicImage::ImageRgb8(image.clone());

            let results = self
                .engine
                .run_from_image(&image)
                .map_err(|e| DetectError::Detection(format!("pure-onnx-ocr: {}", e)))?;

            let blocks: Vec<DetectedBlock> = results
                .iter()
                .filter_map(|r| {
                    let points = r.bounding_box.exterior().coords().take(4).map(|c| (c.x, c.y));
                    let region = hull(points)?;
                    Some(DetectedBlock {
                        id: 0,
                        text: r.text.replace("[UNK]", " "),
                        region,
                        confidence: round_confidence(r.confidence),
                    })
                })
                .collect();

            debug!("OCR found {} text regions in {}ms", blocks.len(), start.elapsed().as_millis());
            Ok(reading_order(blocks))
        }
    }
}
