//! Content-aware fill through a shared inpainting model.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::{GrayImage, RgbImage};
use tracing::{debug, info};

use crate::error::FillError;
use crate::geometry::PixelRect;
use crate::mask::Mask;

/// An image + mask -> image reconstruction capability.
///
/// Implementations may be stateful and are not expected to tolerate
/// concurrent calls; [`ContentAwareFill`] serializes access.
pub trait Inpainter: Send {
    /// Reconstruct the pixels where `mask` is non-zero.
    ///
    /// Must return an image with the same dimensions as `image`.
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage, FillError>;
}

/// Content-aware fill strategy.
///
/// Clones share one inpainter behind one process-wide lock. The lock is
/// held only for the inference call itself; mask preparation and pixel
/// copying run outside it.
#[derive(Clone)]
pub struct ContentAwareFill {
    inpainter: Arc<Mutex<Box<dyn Inpainter>>>,
}

impl ContentAwareFill {
    /// Wrap an initialized inpainter.
    ///
    /// Model loading is the expensive step and belongs to the inpainter's
    /// constructor, so the first fill pays no hidden initialization cost.
    pub fn new(inpainter: impl Inpainter + 'static) -> Self {
        Self {
            inpainter: Arc::new(Mutex::new(Box::new(inpainter))),
        }
    }

    /// Inpaint `mask` and copy the reconstruction into `rect`.
    ///
    /// Pixels outside `rect` are never written, even though the padded mask
    /// lets the model see past the region's edges. On error `image` is left
    /// unchanged.
    pub fn fill(&self, image: &mut RgbImage, mask: &Mask, rect: PixelRect) -> Result<(), FillError> {
        if mask.dimensions() != image.dimensions() {
            return Err(FillError::InvalidOutput(format!(
                "mask is {:?} but page is {:?}",
                mask.dimensions(),
                image.dimensions()
            )));
        }

        info!("Inpainting region {:?} (mask {:?})", rect, mask.active_rect());
        let start = Instant::now();

        let reconstructed = {
            let mut inpainter = self.inpainter.lock().map_err(|_| FillError::LockPoisoned)?;
            inpainter.inpaint(image, mask.image())?
        };

        debug!("Inpainting took {}ms", start.elapsed().as_millis());

        if reconstructed.dimensions() != image.dimensions() {
            return Err(FillError::InvalidOutput(format!(
                "inpainter returned {:?} for a {:?} page",
                reconstructed.dimensions(),
                image.dimensions()
            )));
        }

        for (x, y) in rect.pixels() {
            image.put_pixel(x, y, *reconstructed.get_pixel(x, y));
        }
        Ok(())
    }
}
