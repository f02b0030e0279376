//! Pipeline orchestration: decode, segment, composite
//!
//! [`CutoutProcessor`] wires the segmentation seam and the compositor
//! together. Processing takes `&self`: each request works on its own
//! buffers, and the only cross-request state is the lazily initialized
//! shared model handle.

use crate::{
    color::Background,
    compositor::{ComposeOptions, Compositor, ShadowSpec},
    config::PipelineConfig,
    error::Result,
    segmentation::{AlphaMode, BackendFactory, SegmentationOptions, SharedBackend},
    services::ImageIOService,
    types::{CompositeResult, ProcessingMetadata, ProcessingTimings},
};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use instant::Instant;
use std::path::Path;
use tracing::{debug, info, instrument, span, Level};

/// Per-request overrides merged over the deployment defaults
///
/// `None` fields fall back to [`PipelineConfig`]; this mirrors the
/// optional form fields of the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RequestOptions {
    /// Override the shadow toggle
    pub shadow: Option<bool>,
    /// Override the background specification
    pub background: Option<Background>,
    /// Override the alpha-matting preset
    pub alpha_mode: Option<AlphaMode>,
}

impl RequestOptions {
    /// Options that defer entirely to the deployment defaults
    #[must_use]
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Set the shadow toggle
    #[must_use]
    pub fn with_shadow(mut self, enabled: bool) -> Self {
        self.shadow = Some(enabled);
        self
    }

    /// Set the background
    #[must_use]
    pub fn with_background(mut self, background: Background) -> Self {
        self.background = Some(background);
        self
    }

    /// Set the alpha-matting preset
    #[must_use]
    pub fn with_alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.alpha_mode = Some(mode);
        self
    }
}

/// End-to-end processor for upload requests
pub struct CutoutProcessor {
    config: PipelineConfig,
    session: SharedBackend,
}

impl CutoutProcessor {
    /// Create a processor; the model handle stays cold until first use
    ///
    /// # Errors
    ///
    /// Returns [`crate::CutoutError::InvalidConfig`] when the configuration
    /// fails validation.
    pub fn new(config: PipelineConfig, factory: Box<dyn BackendFactory>) -> Result<Self> {
        config.validate()?;
        let session = SharedBackend::new(config.segmentation.clone(), factory);
        Ok(Self { config, session })
    }

    /// The deployment configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether the model handle has been created
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.session.is_initialized()
    }

    /// Process raw upload bytes
    ///
    /// # Errors
    ///
    /// Returns [`crate::CutoutError::Decode`] for malformed payloads (client
    /// fault) and [`crate::CutoutError::Segmentation`] for backend failures
    /// (server fault, not retried).
    pub fn process_bytes(&self, bytes: &[u8], request: &RequestOptions) -> Result<CompositeResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::decode_bytes(bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image, request)?;
        result.metadata.timings.decode_ms = decode_ms;
        result.metadata.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Process an image file on disk
    ///
    /// # Errors
    ///
    /// Same as [`process_bytes`](Self::process_bytes), plus
    /// [`crate::CutoutError::Io`] for filesystem failures.
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        request: &RequestOptions,
    ) -> Result<CompositeResult> {
        let image = ImageIOService::load_image(path)?;
        self.process_image(&image, request)
    }

    /// Process an image from an async reader
    ///
    /// # Errors
    ///
    /// Same as [`process_bytes`](Self::process_bytes), plus
    /// [`crate::CutoutError::Io`] for stream read failures.
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &self,
        mut reader: R,
        request: &RequestOptions,
    ) -> Result<CompositeResult> {
        let mut buffer = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
        self.process_bytes(&buffer, request)
    }

    /// Process an already-decoded image
    ///
    /// # Errors
    ///
    /// Returns [`crate::CutoutError::Segmentation`] for backend failures and
    /// [`crate::CutoutError::Internal`] for compositing bugs.
    #[instrument(
        skip(self, image, request),
        fields(
            model = %self.config.segmentation.model_name,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(
        &self,
        image: &DynamicImage,
        request: &RequestOptions,
    ) -> Result<CompositeResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let original_dimensions = image.dimensions();

        info!(
            model = %self.config.segmentation.model_name,
            "starting upload processing"
        );

        let working = self.resize_for_segmentation(image);
        let working = working.as_ref().unwrap_or(image);

        let segmentation_options = self.segmentation_options(request);
        let backend = self.session.get()?;
        let cutout = {
            let _span = span!(
                Level::INFO,
                "segmentation",
                model = %backend.model_name(),
                alpha_matting = segmentation_options.alpha_matting
            )
            .entered();
            let segmentation_start = Instant::now();
            let cutout = backend.segment(working, &segmentation_options)?;
            timings.segmentation_ms = segmentation_start.elapsed().as_millis() as u64;
            cutout
        };

        let compose_options = self.compose_options(request)?;
        let composited = {
            let _span = span!(
                Level::DEBUG,
                "compositing",
                shadow = compose_options.shadow.is_some(),
                background = %compose_options.background
            )
            .entered();
            let compositing_start = Instant::now();
            let composited = Compositor::composite(&cutout, &compose_options)?;
            timings.compositing_ms = compositing_start.elapsed().as_millis() as u64;
            composited
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(
            segmentation_ms = timings.segmentation_ms,
            compositing_ms = timings.compositing_ms,
            "upload processing finished"
        );

        let mut metadata = ProcessingMetadata::new(backend.model_name().to_string());
        metadata.set_timings(timings);

        Ok(CompositeResult::new(
            composited,
            original_dimensions,
            metadata,
        ))
    }

    /// Effective compositing passes for a request
    ///
    /// # Errors
    ///
    /// Returns [`crate::CutoutError::InvalidConfig`] when the shadow spec is
    /// out of range (possible when the config was mutated after build).
    fn compose_options(&self, request: &RequestOptions) -> Result<ComposeOptions> {
        let shadow_enabled = request.shadow.unwrap_or(self.config.shadow_enabled);
        let shadow: Option<ShadowSpec> = shadow_enabled.then_some(self.config.shadow);
        if let Some(spec) = &shadow {
            spec.validate()?;
        }
        Ok(ComposeOptions {
            shadow,
            background: request.background.unwrap_or(self.config.background),
        })
    }

    /// Effective segmentation options for a request
    fn segmentation_options(&self, request: &RequestOptions) -> SegmentationOptions {
        let mode = request.alpha_mode.unwrap_or(self.config.alpha_mode);
        SegmentationOptions::for_mode(mode, self.config.alpha_matting)
    }

    /// Aspect-preserving resize to the configured bound, if any
    fn resize_for_segmentation(&self, image: &DynamicImage) -> Option<DynamicImage> {
        let bound = self.config.segmentation.resize_to?;
        let (width, height) = image.dimensions();
        if width.max(height) <= bound {
            return None;
        }
        debug!(bound, width, height, "resizing input before segmentation");
        Some(image.resize(bound, bound, FilterType::Lanczos3))
    }
}

impl std::fmt::Debug for CutoutProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutoutProcessor")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockBackendFactory, MockSegmentationBackend};
    use crate::error::CutoutError;

    fn processor_with(backend: MockSegmentationBackend, config: PipelineConfig) -> CutoutProcessor {
        CutoutProcessor::new(config, Box::new(MockBackendFactory::new(backend))).unwrap()
    }

    fn red_image(width: u32, height: u32) -> DynamicImage {
        let mut img = image::RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([255, 0, 0, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_process_image_defers_to_config_defaults() {
        let backend = MockSegmentationBackend::centered_square(0.4);
        let processor = processor_with(backend.clone(), PipelineConfig::default());

        let result = processor
            .process_image(&red_image(100, 100), &RequestOptions::defaults())
            .unwrap();

        // Transparent background, no shadow: alpha equals the cutout mask.
        assert_eq!(result.dimensions(), (100, 100));
        assert_eq!(result.image.get_pixel(50, 50).0, [255, 0, 0, 255]);
        assert_eq!(result.image.get_pixel(5, 5).0[3], 0);
        assert_eq!(result.metadata.model_name, "u2net");

        let history = backend.call_history();
        assert_eq!(history.len(), 1);
        assert!(history[0].contains("fg=240"));
    }

    #[test]
    fn test_request_overrides_take_precedence() {
        let backend = MockSegmentationBackend::centered_square(0.4);
        let processor = processor_with(backend.clone(), PipelineConfig::default());

        let request = RequestOptions::defaults()
            .with_shadow(true)
            .with_background(Background::Solid([255, 255, 255]))
            .with_alpha_mode(AlphaMode::Strong);
        let result = processor.process_image(&red_image(100, 100), &request).unwrap();

        // Opaque background makes the whole output opaque.
        assert!(result.image.pixels().all(|p| p.0[3] == 255));
        assert!(backend.call_history()[0].contains("fg=280"));
    }

    #[test]
    fn test_segmentation_failure_is_server_fault() {
        let processor = processor_with(
            MockSegmentationBackend::new_failing(),
            PipelineConfig::default(),
        );
        let err = processor
            .process_image(&red_image(10, 10), &RequestOptions::defaults())
            .unwrap_err();
        assert!(matches!(err, CutoutError::Segmentation(_)));
        assert!(!err.is_client_fault());
    }

    #[test]
    fn test_process_bytes_rejects_garbage() {
        let processor = processor_with(
            MockSegmentationBackend::fully_opaque(),
            PipelineConfig::default(),
        );
        let err = processor
            .process_bytes(b"definitely not an image", &RequestOptions::defaults())
            .unwrap_err();
        assert!(matches!(err, CutoutError::Decode(_)));
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_resize_bound_applies_before_segmentation() {
        let config = PipelineConfig::builder().resize_to(50).build().unwrap();
        let processor = processor_with(MockSegmentationBackend::fully_opaque(), config);

        let result = processor
            .process_image(&red_image(200, 100), &RequestOptions::defaults())
            .unwrap();
        assert_eq!(result.original_dimensions, (200, 100));
        assert_eq!(result.dimensions(), (50, 25));
    }

    #[test]
    fn test_model_handle_stays_cold_until_first_request() {
        let processor = processor_with(
            MockSegmentationBackend::fully_opaque(),
            PipelineConfig::default(),
        );
        assert!(!processor.is_warm());
        processor
            .process_image(&red_image(8, 8), &RequestOptions::defaults())
            .unwrap();
        assert!(processor.is_warm());
    }

    #[tokio::test]
    async fn test_process_reader() {
        let processor = processor_with(
            MockSegmentationBackend::fully_opaque(),
            PipelineConfig::default(),
        );
        let png = {
            let result = CompositeResult::new(
                image::RgbaImage::from_pixel(6, 6, image::Rgba([1, 2, 3, 255])),
                (6, 6),
                ProcessingMetadata::new("fixture".to_string()),
            );
            result.to_png_bytes().unwrap()
        };
        let result = processor
            .process_reader(std::io::Cursor::new(png), &RequestOptions::defaults())
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (6, 6));
    }
}
