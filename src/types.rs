//! Core types for cutout compositing operations

use crate::error::{CutoutError, Result};
use chrono::Utc;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Axis-aligned bounding box in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// Left edge (inclusive)
    pub x: u32,
    /// Top edge (inclusive)
    pub y: u32,
    /// Width in pixels (at least 1)
    pub width: u32,
    /// Height in pixels (at least 1)
    pub height: u32,
}

impl BoundingBox {
    /// Horizontal midpoint in sub-pixel coordinates
    #[must_use]
    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }

    /// Bottom edge (exclusive) in sub-pixel coordinates
    #[must_use]
    pub fn bottom(&self) -> f32 {
        (self.y + self.height) as f32
    }
}

/// Segmentation result: an RGBA image whose alpha channel encodes the
/// model's per-pixel foreground confidence (0 = background, 255 = foreground)
///
/// Produced once per request by the segmentation backend and consumed
/// read-only by the compositor.
#[derive(Debug, Clone)]
pub struct Cutout {
    image: RgbaImage,
}

impl Cutout {
    /// Wrap an RGBA buffer whose alpha channel is a foreground mask
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Convert any decoded image into a cutout, forcing RGBA
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            image: image.to_rgba8(),
        }
    }

    /// Image dimensions as (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrow the underlying RGBA buffer
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the cutout, returning the underlying RGBA buffer
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Bounding box of all pixels with nonzero alpha
    ///
    /// Returns `None` for a fully transparent cutout. This is the defined
    /// empty-subject case, not an error: shadow synthesis treats it as
    /// "nothing casts a shadow".
    #[must_use]
    pub fn alpha_bounding_box(&self) -> Option<BoundingBox> {
        let (width, height) = self.image.dimensions();
        let mut min_x = width;
        let mut min_y = height;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;

        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel.0[3] > 0 {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        found.then(|| BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }
}

/// Per-stage wall-clock timings in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image decode time
    pub decode_ms: u64,
    /// Segmentation (external model) time
    pub segmentation_ms: u64,
    /// Shadow synthesis and compositing time
    pub compositing_ms: u64,
    /// Total end-to-end time
    pub total_ms: u64,
}

/// Metadata describing how a result was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Name of the segmentation model that produced the cutout
    pub model_name: String,
    /// When processing completed (UTC, RFC 3339)
    pub timestamp: String,
    /// Per-stage timings
    pub timings: ProcessingTimings,
}

impl ProcessingMetadata {
    /// Create metadata stamped with the current time
    #[must_use]
    pub fn new(model_name: String) -> Self {
        Self {
            model_name,
            timestamp: Utc::now().to_rfc3339(),
            timings: ProcessingTimings::default(),
        }
    }

    /// Attach stage timings
    pub fn set_timings(&mut self, timings: ProcessingTimings) {
        self.timings = timings;
    }
}

/// Final composited image plus processing metadata
///
/// The image is always RGBA; PNG is the only encoded form because it
/// preserves the alpha channel exactly for the transparent-background case.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// The composited RGBA image
    pub image: RgbaImage,
    /// Dimensions of the decoded input before any configured resize
    pub original_dimensions: (u32, u32),
    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl CompositeResult {
    /// Create a new result
    #[must_use]
    pub fn new(
        image: RgbaImage,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            original_dimensions,
            metadata,
        }
    }

    /// Output dimensions as (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode the result as PNG bytes
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Internal`]: encoding a well-formed RGBA
    /// buffer should not fail, so a failure here is a bug rather than a
    /// recoverable condition.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .map_err(|e| CutoutError::internal(format!("PNG encoding failed: {e}")))?;
        Ok(buffer)
    }

    /// Save the result as a PNG file
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Io`] for filesystem failures and
    /// [`CutoutError::Internal`] for encoder failures.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_png_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
