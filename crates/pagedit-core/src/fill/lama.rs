//! LaMa-style inpainting over an ONNX backend.

use image::{GrayImage, Rgb, RgbImage};
use ndarray::{Array4, ArrayD, Axis};
use tracing::debug;

use pagedit_inference::{InferenceBackend, InputTensor};

use crate::error::FillError;

use super::content_aware::Inpainter;

/// Spatial dimensions the network accepts must be multiples of this.
const SIZE_MULTIPLE: u32 = 8;

/// Inpainter running a LaMa-family ONNX model.
///
/// Expects two inputs, an `image` tensor `[1, 3, H, W]` in `0..1` and a
/// `mask` tensor `[1, 1, H, W]` of `0`/`1`, and produces `[1, 3, H, W]`
/// pixels on either the `0..1` or `0..255` scale.
pub struct LamaInpainter<B: InferenceBackend> {
    backend: B,
    image_input: String,
    mask_input: String,
}

impl<B: InferenceBackend> LamaInpainter<B> {
    /// Wrap a loaded backend, resolving its input names.
    pub fn new(backend: B) -> Result<Self, FillError> {
        let image_input = backend.input_name_or("image", 0)?;
        let mask_input = backend.input_name_or("mask", 1)?;
        debug!("LaMa inputs: image='{}', mask='{}'", image_input, mask_input);
        Ok(Self {
            backend,
            image_input,
            mask_input,
        })
    }

    fn padded_size(width: u32, height: u32) -> (u32, u32) {
        let round = |v: u32| v.div_ceil(SIZE_MULTIPLE) * SIZE_MULTIPLE;
        (round(width), round(height))
    }

    /// NCHW tensors, edge-replicated out to the padded size.
    fn prepare(&self, image: &RgbImage, mask: &GrayImage) -> (Array4<f32>, Array4<f32>) {
        let (width, height) = image.dimensions();
        let (pad_w, pad_h) = Self::padded_size(width, height);

        let mut image_tensor = Array4::<f32>::zeros((1, 3, pad_h as usize, pad_w as usize));
        let mut mask_tensor = Array4::<f32>::zeros((1, 1, pad_h as usize, pad_w as usize));

        for y in 0..pad_h {
            let sy = y.min(height - 1);
            for x in 0..pad_w {
                let sx = x.min(width - 1);
                let pixel = image.get_pixel(sx, sy);
                for c in 0..3 {
                    image_tensor[[0, c, y as usize, x as usize]] = f32::from(pixel[c]) / 255.0;
                }
                if x < width && y < height && mask.get_pixel(x, y)[0] > 0 {
                    mask_tensor[[0, 0, y as usize, x as usize]] = 1.0;
                }
            }
        }

        (image_tensor, mask_tensor)
    }

    fn to_image(output: &ArrayD<f32>, width: u32, height: u32) -> Result<RgbImage, FillError> {
        let shape = output.shape();
        if shape.len() != 4 || shape[1] != 3 {
            return Err(FillError::InvalidOutput(format!("unexpected output shape {:?}", shape)));
        }
        if shape[2] < height as usize || shape[3] < width as usize {
            return Err(FillError::InvalidOutput(format!(
                "output {:?} smaller than page {}x{}",
                shape, width, height
            )));
        }

        let first = output.index_axis(Axis(0), 0);
        Ok(RgbImage::from_fn(width, height, |x, y| {
            let channel = |c: usize| {
                first[[c, y as usize, x as usize]].round().clamp(0.0, 255.0) as u8
            };
            Rgb([channel(0), channel(1), channel(2)])
        }))
    }
}

impl<B: InferenceBackend> Inpainter for LamaInpainter<B> {
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, FillError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FillError::InvalidOutput("empty page image".to_string()));
        }
        if mask.dimensions() != (width, height) {
            return Err(FillError::InvalidOutput(format!(
                "mask {:?} does not match page {}x{}",
                mask.dimensions(),
                width,
                height
            )));
        }

        let (image_tensor, mask_tensor) = self.prepare(image, mask);
        debug!("LaMa input shape: {:?}", image_tensor.shape());

        let outputs = self.backend.run(&[
            (self.image_input.as_str(), InputTensor::Float32(image_tensor.into_dyn())),
            (self.mask_input.as_str(), InputTensor::Float32(mask_tensor.into_dyn())),
        ])?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| FillError::InvalidOutput("model produced no output".to_string()))?
            .1
            .into_pixel_scale();

        Self::to_image(&output, width, height)
    }
}

#[cfg(feature = "native")]
impl LamaInpainter<pagedit_inference::OrtBackend> {
    /// Load the inpainting model named in `config` with ONNX Runtime.
    ///
    /// This is the slow step of content-aware fill; do it once at startup.
    pub fn from_config(config: &crate::models::config::ModelConfig) -> Result<Self, FillError> {
        let path = config.model_dir.join(&config.inpaint_model);
        if !path.is_file() {
            return Err(FillError::Unavailable(format!(
                "inpainting model not found at {}",
                path.display()
            )));
        }

        let options = pagedit_inference::OrtOptions {
            intra_threads: config.num_threads.max(1),
        };
        let backend = pagedit_inference::OrtBackend::from_file(&path, options)?;
        tracing::info!("Loaded inpainting model from {}", path.display());
        Self::new(backend)
    }
}
