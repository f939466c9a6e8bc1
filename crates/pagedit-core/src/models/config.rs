//! Configuration for the editing pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fill::FillStrategy;

/// Main configuration for pagedit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageditConfig {
    /// Region fill configuration.
    pub fill: FillConfig,

    /// Font-fit configuration.
    pub layout: LayoutConfig,

    /// Font lookup configuration.
    pub fonts: FontConfig,

    /// Model configuration.
    pub models: ModelConfig,

    /// Session storage configuration.
    pub storage: StorageConfig,
}

/// Region fill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Pixels added around each region before content-aware fill.
    pub mask_padding: u32,

    /// Width of the ring sampled by border-average fill.
    pub border_width: u32,

    /// Hex colour used when the sampling ring is empty.
    pub fallback_color: String,

    /// Strategy used when an edit does not name one.
    pub default_strategy: FillStrategy,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            mask_padding: crate::mask::DEFAULT_MASK_PADDING,
            border_width: crate::fill::DEFAULT_BORDER_WIDTH,
            fallback_color: "#ffffff".to_string(),
            default_strategy: FillStrategy::ContentAware,
        }
    }
}

/// Font-fit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Initial size estimate as a fraction of the box height.
    pub height_ratio: f32,

    /// Smallest font size ever chosen, in pixels.
    pub min_font_size: u32,

    /// Safety margin applied when shrinking to fit the box width.
    pub width_margin: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            height_ratio: 0.8,
            min_font_size: 10,
            width_margin: 0.95,
        }
    }
}

/// Font lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Directory holding `<Family>-<Variant>.ttf` files.
    pub font_dir: PathBuf,

    /// Family used for unknown requests.
    pub default_family: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            font_dir: PathBuf::from("static/fonts"),
            default_family: "NotoSansTC".to_string(),
        }
    }
}

/// Model file paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Inpainting model file name.
    pub inpaint_model: String,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Number of CPU threads per inference session.
    pub num_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            inpaint_model: "lama.onnx".to_string(),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            num_threads: 4,
        }
    }
}

/// Session storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per session.
    pub root: PathBuf,

    /// Suffix appended to a page file name to form its backup.
    pub backup_suffix: String,

    /// Resolution used to convert between pixels and PDF points.
    pub render_dpi: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".tmp"),
            backup_suffix: ".original".to_string(),
            render_dpi: 200,
        }
    }
}

impl PageditConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PageditConfig::default();
        assert_eq!(config.fill.mask_padding, 5);
        assert_eq!(config.fill.default_strategy, FillStrategy::ContentAware);
        assert_eq!(config.layout, LayoutConfig::default());
        assert_eq!(config.storage.backup_suffix, ".original");
        assert_eq!(config.model_path("lama.onnx"), PathBuf::from("models/lama.onnx"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PageditConfig =
            serde_json::from_str(r#"{"layout": {"min_font_size": 14}, "fill": {"default_strategy": "border_average"}}"#)
                .unwrap();
        assert_eq!(config.layout.min_font_size, 14);
        assert_eq!(config.layout.height_ratio, 0.8);
        assert_eq!(config.fill.default_strategy, FillStrategy::BorderAverage);
        assert_eq!(config.fonts.default_family, "NotoSansTC");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = PageditConfig::default();
        config.storage.render_dpi = 300;
        config.save(&path).unwrap();

        let loaded = PageditConfig::from_file(&path).unwrap();
        assert_eq!(loaded.storage.render_dpi, 300);
        assert_eq!(loaded.models.inpaint_model, "lama.onnx");
    }
}
