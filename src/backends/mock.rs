//! Mock segmentation backend for testing and debugging
//!
//! Produces deterministic alpha masks over the input's own pixels, so
//! pipeline behavior can be verified without model files or an inference
//! runtime.

use crate::{
    error::{CutoutError, Result},
    segmentation::{BackendFactory, SegmentationBackend, SegmentationConfig, SegmentationOptions},
    types::Cutout,
};
use image::DynamicImage;
use std::sync::{Arc, Mutex};

/// Deterministic mask patterns the mock can produce
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockMask {
    /// Alpha 255 inside a centered square covering the given fraction of
    /// each dimension, 0 elsewhere
    CenteredSquare(f32),
    /// Alpha 255 everywhere
    FullyOpaque,
    /// Alpha 0 everywhere
    FullyTransparent,
}

/// Mock segmentation backend with call recording
#[derive(Debug, Clone)]
pub struct MockSegmentationBackend {
    model_name: String,
    mask: MockMask,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    /// Whether to simulate a model invocation failure
    should_fail: bool,
}

impl MockSegmentationBackend {
    /// Create a mock producing the given mask pattern
    #[must_use]
    pub fn new(mask: MockMask) -> Self {
        Self {
            model_name: "mock-u2net".to_string(),
            mask,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    /// Mock that marks a centered square as foreground
    #[must_use]
    pub fn centered_square(fraction: f32) -> Self {
        Self::new(MockMask::CenteredSquare(fraction))
    }

    /// Mock that marks the entire image as foreground
    #[must_use]
    pub fn fully_opaque() -> Self {
        Self::new(MockMask::FullyOpaque)
    }

    /// Mock that marks nothing as foreground
    #[must_use]
    pub fn fully_transparent() -> Self {
        Self::new(MockMask::FullyTransparent)
    }

    /// Mock whose `segment` calls fail
    #[must_use]
    pub fn new_failing() -> Self {
        let mut backend = Self::fully_opaque();
        backend.should_fail = true;
        backend
    }

    /// Override the reported model name
    #[must_use]
    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model_name = name.to_string();
        self
    }

    /// Get the call history for verification in tests
    #[must_use]
    pub fn call_history(&self) -> Vec<String> {
        self.call_history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record_call(&self, description: String) {
        self.call_history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(description);
    }

    fn mask_alpha(&self, x: u32, y: u32, width: u32, height: u32) -> u8 {
        match self.mask {
            MockMask::FullyOpaque => 255,
            MockMask::FullyTransparent => 0,
            MockMask::CenteredSquare(fraction) => {
                let fraction = fraction.clamp(0.0, 1.0);
                let side_w = (width as f32 * fraction).round() as u32;
                let side_h = (height as f32 * fraction).round() as u32;
                let left = (width - side_w) / 2;
                let top = (height - side_h) / 2;
                let inside =
                    x >= left && x < left + side_w && y >= top && y < top + side_h;
                if inside {
                    255
                } else {
                    0
                }
            },
        }
    }
}

impl SegmentationBackend for MockSegmentationBackend {
    fn segment(&self, image: &DynamicImage, options: &SegmentationOptions) -> Result<Cutout> {
        self.record_call(format!(
            "segment alpha_matting={} fg={} bg={} erode={}",
            options.alpha_matting,
            options.matting.foreground_threshold,
            options.matting.background_threshold,
            options.matting.erode_size
        ));

        if self.should_fail {
            return Err(CutoutError::segmentation("mock backend invocation failed"));
        }

        let mut rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            pixel.0[3] = self.mask_alpha(x, y, width, height);
        }
        Ok(Cutout::new(rgba))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Factory that hands out clones of a preconfigured mock backend
#[derive(Debug, Clone)]
pub struct MockBackendFactory {
    backend: MockSegmentationBackend,
}

impl MockBackendFactory {
    /// Create a factory that produces clones of the given mock
    #[must_use]
    pub fn new(backend: MockSegmentationBackend) -> Self {
        Self { backend }
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(&self, config: &SegmentationConfig) -> Result<Box<dyn SegmentationBackend>> {
        Ok(Box::new(
            self.backend.clone().with_model_name(&config.model_name),
        ))
    }
}
