#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Cutout Compose
//!
//! Compositing pipeline for background-removal services: takes an
//! uploaded image, delegates segmentation to an external pretrained model
//! behind a trait seam, composites an optional ground-contact drop shadow
//! and an optional solid background fill, and produces PNG output that
//! is returned as bytes or persisted as a uniquely named artifact.
//!
//! The segmentation model is never run in-process: frontends inject a
//! [`BackendFactory`] producing a warm [`SegmentationBackend`], and the
//! library guarantees the expensive model handle is created at most once
//! per process even under concurrent first use.
//!
//! ## Quick Start
//!
//! ### Full pipeline (injected backend)
//!
//! ```rust,no_run
//! use cutout_compose::{
//!     AppContext, PipelineConfig, UploadParams, handle_upload,
//!     MockBackendFactory, MockSegmentationBackend,
//! };
//!
//! # fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
//! // In production the factory wraps the real model; the mock stands in
//! // for deployments without one.
//! let factory = Box::new(MockBackendFactory::new(
//!     MockSegmentationBackend::centered_square(0.5),
//! ));
//! let ctx = AppContext::new(PipelineConfig::default(), factory, "./outputs")?;
//!
//! let params = UploadParams {
//!     background: Some("#ffffff".to_string()),
//!     shadow: Some(true),
//!     alpha_mode: None,
//! };
//! let response = handle_upload(&ctx, &upload_bytes, &params)?;
//! println!("{}", response.download_url("http://localhost:8000"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Compositor only (pre-segmented input)
//!
//! ```rust,no_run
//! use cutout_compose::{compose_cutout_from_bytes, ComposeOptions, ShadowSpec, Background};
//!
//! # fn example(cutout_png: Vec<u8>) -> anyhow::Result<()> {
//! let options = ComposeOptions {
//!     shadow: Some(ShadowSpec::default()),
//!     background: Background::Solid([255, 255, 255]),
//! };
//! let result = compose_cutout_from_bytes(&cutout_png, &options)?;
//! result.save_png("composed.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Library vs CLI Usage
//!
//! - **Library usage**: processing, handlers, and the artifact store are
//!   available by default
//! - **CLI usage**: the `cli` feature adds a clap frontend that drives
//!   the compositor over pre-segmented images
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! cutout-compose = { version = "0.2", default-features = false }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod error;
pub mod handler;
pub mod processor;
pub mod segmentation;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Internal imports for lib functions
use tokio::io::AsyncRead;

// Public API exports
pub use backends::{MockBackendFactory, MockMask, MockSegmentationBackend};
pub use color::{parse_color, Background};
pub use compositor::{composite_over, ComposeOptions, Compositor, ShadowSpec};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{CutoutError, Result};
pub use handler::{
    fetch_artifact, handle_upload, handle_upload_streamed, AppContext, UploadParams, UploadResponse,
};
pub use processor::{CutoutProcessor, RequestOptions};
pub use segmentation::{
    AlphaMattingParams, AlphaMode, BackendFactory, SegmentationBackend, SegmentationConfig,
    SegmentationOptions, SharedBackend,
};
pub use services::{ArtifactStore, ImageIOService};
pub use types::{BoundingBox, CompositeResult, Cutout, ProcessingMetadata, ProcessingTimings};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, init_library_tracing, TracingConfig};

/// Run the compositor over an already-segmented image provided as bytes
///
/// The decoded image's alpha channel is treated as the cutout mask (the
/// shape a PNG produced by a background-removal model carries). No
/// segmentation backend is needed, which makes this suitable for web
/// servers that receive pre-cut images.
///
/// # Errors
///
/// Returns [`CutoutError::Decode`] for unreadable bytes,
/// [`CutoutError::InvalidConfig`] for out-of-range shadow parameters.
pub fn compose_cutout_from_bytes(
    cutout_bytes: &[u8],
    options: &ComposeOptions,
) -> Result<CompositeResult> {
    let image = ImageIOService::decode_bytes(cutout_bytes)?;
    let cutout = Cutout::from_dynamic(&image);
    let dimensions = cutout.dimensions();
    let composited = Compositor::composite(&cutout, options)?;
    Ok(CompositeResult::new(
        composited,
        dimensions,
        ProcessingMetadata::new("pre-segmented".to_string()),
    ))
}

/// Run the compositor over an already-segmented image from an async reader
///
/// Stream-based variant of [`compose_cutout_from_bytes`] for network
/// streams and large files.
///
/// # Errors
///
/// Same as [`compose_cutout_from_bytes`], plus [`CutoutError::Io`] for
/// stream read failures.
pub async fn compose_cutout_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    options: &ComposeOptions,
) -> Result<CompositeResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    compose_cutout_from_bytes(&buffer, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cutout_png() -> Vec<u8> {
        let mut img = image::RgbaImage::new(10, 10);
        img.put_pixel(5, 5, image::Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn test_compose_from_bytes_passthrough() {
        let result =
            compose_cutout_from_bytes(&cutout_png(), &ComposeOptions::passthrough()).unwrap();
        assert_eq!(result.dimensions(), (10, 10));
        assert_eq!(result.image.get_pixel(5, 5).0, [1, 2, 3, 255]);
        assert_eq!(result.metadata.model_name, "pre-segmented");
    }

    #[tokio::test]
    async fn test_compose_from_reader() {
        let options = ComposeOptions {
            shadow: None,
            background: Background::Solid([0, 0, 0]),
        };
        let result = compose_cutout_from_reader(std::io::Cursor::new(cutout_png()), &options)
            .await
            .unwrap();
        assert!(result.image.pixels().all(|p| p.0[3] == 255));
    }
}
