//! Downscaling to a long-side bound

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Fit-within bound applied before encoding. Never upscales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeBound {
    max_dimension: u32,
}

impl ResizeBound {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Target dimensions, or `None` when the image already fits
    pub fn target_dimensions(self, width: u32, height: u32) -> Option<(u32, u32)> {
        let bound = self.max_dimension;
        if width <= bound && height <= bound {
            return None;
        }

        let aspect = width as f64 / height as f64;
        let (w, h) = if width >= height {
            (bound, (bound as f64 / aspect).round() as u32)
        } else {
            ((bound as f64 * aspect).round() as u32, bound)
        };

        Some((w.max(1), h.max(1)))
    }

    /// Downscale with Lanczos3 if the image exceeds the bound
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self.target_dimensions(image.width(), image.height()) {
            Some((width, height)) => {
                debug!(
                    "Resizing {}x{} -> {}x{}",
                    image.width(),
                    image.height(),
                    width,
                    height
                );
                image.resize_exact(width, height, FilterType::Lanczos3)
            }
            None => image,
        }
    }
}
