//! Core library for editing text on document page images.
//!
//! This crate provides:
//! - Backup-before-mutation page storage with restore to original
//! - Region fill: content-aware inpainting or border-average colour
//! - Font resolution and size fitting for replacement text
//! - The compositor tying fill, layout and rendering into one edit
//! - Ingestion, text detection and re-assembly around the edit pipeline

pub mod assemble;
pub mod backup;
pub mod compositor;
pub mod detect;
pub mod error;
pub mod fill;
pub mod font;
pub mod geometry;
pub mod ingest;
pub mod layout;
pub mod mask;
pub mod models;
pub mod render;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{OutputFormat, assemble, assemble_session};
pub use backup::{Backup, BackupStore, PageLocks, RestoreEngine, RestoreOutcome};
pub use compositor::{AppliedEdit, BatchResult, CompositeResult, Compositor, CompositorBuilder};
pub use detect::{DetectedBlock, MockDetector, TextDetector, detect_page};
pub use error::{ErrorReport, PageditError, Result};
pub use fill::{ContentAwareFill, FillStrategy, Inpainter, LamaInpainter};
pub use font::{FontAsset, FontResolver};
pub use geometry::Region;
pub use ingest::{Ingested, ingest_file};
pub use layout::{SizeOverride, TextLayout, TextLayoutEngine};
pub use models::config::PageditConfig;
pub use models::edit::EditRequest;
pub use storage::{DirStorage, MemoryStorage, PageId, PageStorage};

#[cfg(feature = "native")]
pub use detect::OcrDetector;

/// Re-export inference types.
pub use pagedit_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use pagedit_inference::OrtBackend;
