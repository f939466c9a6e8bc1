//! ONNX inference abstraction layer for pagedit.
//!
//! Content-aware fill runs an inpainting network (LaMa-style: image plus
//! mask in, reconstructed image out). This crate hides the runtime behind
//! [`InferenceBackend`] so the compositing engine never touches an ONNX
//! session directly:
//! - `ort` with the XNNPACK execution provider on native platforms

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::{OrtBackend, OrtOptions};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
