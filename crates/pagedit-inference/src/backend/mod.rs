//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// Trait for ONNX inference backends.
///
/// A backend owns one loaded model. Callers pass named inputs and receive
/// named outputs; the backend decides how the runtime is driven.
pub trait InferenceBackend: Send + Sync {
    /// Run inference with the given inputs.
    ///
    /// # Arguments
    /// * `inputs` - Named input tensors
    ///
    /// # Returns
    /// Named output tensors from the model
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Get the input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Get the output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Look up an input name, falling back to the input at `position`.
    ///
    /// Exported inpainting models disagree on naming (`image`/`mask`,
    /// `input`/`mask_input`, ...), so resolution by position is the
    /// common denominator.
    fn input_name_or(&self, preferred: &str, position: usize) -> Result<String> {
        let names = self.input_names();
        if let Some(name) = names.iter().find(|n| n.as_str() == preferred) {
            return Ok(name.clone());
        }
        names
            .get(position)
            .cloned()
            .ok_or_else(|| crate::InferenceError::MissingTensor(format!("input '{}'", preferred)))
    }
}
