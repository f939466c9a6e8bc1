//! Error types for the pagedit-core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the pagedit library.
#[derive(Error, Debug)]
pub enum PageditError {
    /// Referenced session or page does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Restore requested for a page that was never edited.
    #[error("no backup exists for {0}")]
    NoBackup(String),

    /// Region is empty once clamped to the page.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Edit request carries a value that cannot be honoured.
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// Region fill failed; the page is left untouched.
    #[error("fill failed: {0}")]
    Fill(#[from] FillError),

    /// Document ingestion error.
    #[error("ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// Text detection error.
    #[error("detection error: {0}")]
    Detect(#[from] DetectError),

    /// Output document assembly error.
    #[error("assembly error: {0}")]
    Assemble(#[from] AssembleError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PageditError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PageditError::NotFound(_) => "not_found",
            PageditError::NoBackup(_) => "no_backup",
            PageditError::InvalidRegion(_) => "invalid_region",
            PageditError::InvalidEdit(_) => "invalid_edit",
            PageditError::Fill(_) => "fill_capability",
            PageditError::Ingest(_) => "ingest",
            PageditError::Detect(_) => "detect",
            PageditError::Assemble(_) => "assemble",
            PageditError::Image(_) => "image",
            PageditError::Io(_) => "io",
            PageditError::Config(_) => "config",
        }
    }

    /// Structured form of this error for transport layers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable failure surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable error kind, see [`PageditError::kind`].
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&PageditError> for ErrorReport {
    fn from(err: &PageditError) -> Self {
        err.report()
    }
}

/// Errors raised by a fill strategy.
#[derive(Error, Debug)]
pub enum FillError {
    /// Content-aware fill was requested but no inpainter is configured.
    #[error("content-aware fill unavailable: {0}")]
    Unavailable(String),

    /// The inpainting model failed.
    #[error("inpainting failed: {0}")]
    Inference(#[from] pagedit_inference::InferenceError),

    /// The inpainter returned something unusable.
    #[error("invalid inpainting output: {0}")]
    InvalidOutput(String),

    /// A previous inference call panicked while holding the model lock.
    #[error("inpainting model lock poisoned")]
    LockPoisoned,
}

/// Font lookup and loading failures.
///
/// These never abort an edit: the resolver logs them and falls back to a
/// default family or the built-in block face.
#[derive(Error, Debug)]
pub enum FontError {
    /// Requested family is not in the registry.
    #[error("unknown font family: {0}")]
    UnknownFamily(String),

    /// Font file could not be read or parsed.
    #[error("failed to load font {path}: {reason}")]
    Load { path: String, reason: String },
}

impl FontError {
    /// Stable kind string, matching [`PageditError::kind`] naming.
    pub fn kind(&self) -> &'static str {
        "font_resolution"
    }
}

/// Errors related to document ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    /// File extension is not a supported document type.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// A page carries no raster image to edit.
    #[error("page {0} has no raster image")]
    NoRaster(u32),

    /// Page rendering is unavailable or failed.
    #[error("PDF rendering failed: {0}")]
    Render(String),
}

/// Errors related to text detection.
#[derive(Error, Debug)]
pub enum DetectError {
    /// Failed to load detection models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Detection run failed.
    #[error("text detection failed: {0}")]
    Detection(String),
}

/// Errors related to output document assembly.
#[derive(Error, Debug)]
pub enum AssembleError {
    /// No pages were given.
    #[error("no pages to assemble")]
    Empty,

    /// Single-image output was requested for a multi-page document.
    #[error("cannot write {0} pages as a single image")]
    MultiPageImage(usize),

    /// PDF serialisation failed.
    #[error("failed to write PDF: {0}")]
    Pdf(String),
}

/// Result type for the pagedit library.
pub type Result<T> = std::result::Result<T, PageditError>;
