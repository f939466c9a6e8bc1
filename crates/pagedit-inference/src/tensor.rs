//! Tensor types for inference input/output.
//!
//! Inpainting models consume normalised `f32` images and emit either
//! `f32` or `u8` pixels depending on how they were exported, so only
//! those two element types are carried.

use ndarray::{ArrayD, IxDyn};

use crate::{InferenceError, Result};

/// Supported tensor data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Uint8,
}

/// Input tensor for inference.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
    Uint8(ArrayD<u8>),
}

impl InputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
            InputTensor::Uint8(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            InputTensor::Float32(_) => TensorType::Float32,
            InputTensor::Uint8(_) => TensorType::Uint8,
        }
    }

    /// Create a Float32 tensor from raw data and shape.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(InputTensor::Float32)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Uint8(ArrayD<u8>),
}

impl OutputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Uint8(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            OutputTensor::Float32(_) => TensorType::Float32,
            OutputTensor::Uint8(_) => TensorType::Uint8,
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Convert to an `f32` array on the 0-255 pixel scale.
    ///
    /// `u8` outputs are widened as-is. `f32` outputs whose maximum does not
    /// exceed 1.0 are treated as normalised and multiplied by 255.
    pub fn into_pixel_scale(self) -> ArrayD<f32> {
        match self {
            OutputTensor::Uint8(arr) => arr.mapv(f32::from),
            OutputTensor::Float32(arr) => {
                let max = arr.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                if max <= 1.0 {
                    arr.mapv(|v| v * 255.0)
                } else {
                    arr
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_f32_shape_mismatch() {
        let result = InputTensor::from_f32(vec![0.0; 5], &[1, 2, 3]);
        assert!(matches!(result, Err(InferenceError::InvalidInput(_))));
    }

    #[test]
    fn test_from_f32_shape() {
        let tensor = InputTensor::from_f32(vec![0.0; 6], &[1, 2, 3]).unwrap();
        assert_eq!(tensor.shape(), &[1, 2, 3]);
        assert_eq!(tensor.dtype(), TensorType::Float32);
    }

    #[test]
    fn test_normalised_output_rescaled() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.0f32, 1.0]).unwrap();
        let scaled = OutputTensor::Float32(arr).into_pixel_scale();
        assert_eq!(scaled.iter().cloned().collect::<Vec<_>>(), vec![0.0, 255.0]);
    }

    #[test]
    fn test_pixel_output_untouched() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2]), vec![12.0f32, 200.0]).unwrap();
        let scaled = OutputTensor::Float32(arr).into_pixel_scale();
        assert_eq!(scaled.iter().cloned().collect::<Vec<_>>(), vec![12.0, 200.0]);

        let bytes = ArrayD::from_shape_vec(IxDyn(&[2]), vec![3u8, 250]).unwrap();
        let widened = OutputTensor::Uint8(bytes).into_pixel_scale();
        assert_eq!(widened.iter().cloned().collect::<Vec<_>>(), vec![3.0, 250.0]);
    }
}
