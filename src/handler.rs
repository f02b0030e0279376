//! Transport-agnostic upload and retrieval handlers
//!
//! An HTTP frontend maps its route parameters onto [`UploadParams`] and
//! calls these functions; nothing here knows about a web framework. The
//! [`AppContext`] is built once at startup and passed to every handler,
//! replacing the module-level globals the service iterations relied on.

use crate::{
    color::Background,
    config::PipelineConfig,
    error::Result,
    processor::{CutoutProcessor, RequestOptions},
    segmentation::{AlphaMode, BackendFactory},
    services::ArtifactStore,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Shared application state for request handlers
///
/// Constructed once at startup; handlers borrow it per request. The
/// processor's model handle is the only lazily initialized member.
#[derive(Debug)]
pub struct AppContext {
    /// The upload processing pipeline
    pub processor: CutoutProcessor,
    /// Where output PNGs are persisted
    pub store: ArtifactStore,
}

impl AppContext {
    /// Build the application context
    ///
    /// # Errors
    ///
    /// Returns [`crate::CutoutError::InvalidConfig`] for invalid
    /// configuration and [`crate::CutoutError::Io`] when the output
    /// directory cannot be created.
    pub fn new<P: Into<PathBuf>>(
        config: PipelineConfig,
        factory: Box<dyn BackendFactory>,
        output_dir: P,
    ) -> Result<Self> {
        Ok(Self {
            processor: CutoutProcessor::new(config, factory)?,
            store: ArtifactStore::new(output_dir)?,
        })
    }
}

/// Optional upload form fields
///
/// All fields are optional; missing ones defer to the deployment
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadParams {
    /// Background specification: "transparent", "#RRGGBB", or a color name
    #[serde(default)]
    pub background: Option<String>,
    /// Whether to composite a drop shadow
    #[serde(default)]
    pub shadow: Option<bool>,
    /// Alpha-matting preset: "standard" or "strong"
    #[serde(default)]
    pub alpha_mode: Option<String>,
}

impl UploadParams {
    /// Parse the string-typed fields into processor options
    ///
    /// # Errors
    ///
    /// Returns [`crate::CutoutError::InvalidColor`] for an unparseable
    /// background and [`crate::CutoutError::InvalidConfig`] for an
    /// unknown alpha mode; both are client faults.
    pub fn to_request(&self) -> Result<RequestOptions> {
        let background = self
            .background
            .as_deref()
            .map(Background::parse)
            .transpose()?;
        let alpha_mode = self
            .alpha_mode
            .as_deref()
            .map(str::parse::<AlphaMode>)
            .transpose()?;
        Ok(RequestOptions {
            shadow: self.shadow,
            background,
            alpha_mode,
        })
    }
}

/// JSON descriptor returned for persisted uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always "success" (failures surface as errors, never as a body)
    pub status: String,
    /// Unique artifact filename under the output directory
    pub filename: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

impl UploadResponse {
    /// Absolute download URL for a given deployment base URL
    #[must_use]
    pub fn download_url(&self, base_url: &str) -> String {
        format!("{}/download/{}", base_url.trim_end_matches('/'), self.filename)
    }
}

/// Handle an upload end to end, persisting the output PNG
///
/// # Errors
///
/// Client faults: [`crate::CutoutError::Decode`],
/// [`crate::CutoutError::InvalidColor`],
/// [`crate::CutoutError::InvalidConfig`]. Server faults:
/// [`crate::CutoutError::Segmentation`], [`crate::CutoutError::Io`],
/// [`crate::CutoutError::Internal`].
pub fn handle_upload(
    ctx: &AppContext,
    payload: &[u8],
    params: &UploadParams,
) -> Result<UploadResponse> {
    let request = params.to_request()?;
    let result = ctx.processor.process_bytes(payload, &request)?;
    let png = result.to_png_bytes()?;
    let (width, height) = result.dimensions();
    let filename = ctx.store.store_png(&png)?;
    info!(filename = %filename, width, height, "upload processed and stored");
    Ok(UploadResponse {
        status: "success".to_string(),
        filename,
        width,
        height,
    })
}

/// Handle an upload end to end, returning the PNG bytes directly
///
/// For deployments that stream the result instead of persisting it.
///
/// # Errors
///
/// Same as [`handle_upload`] minus storage failures.
pub fn handle_upload_streamed(
    ctx: &AppContext,
    payload: &[u8],
    params: &UploadParams,
) -> Result<Vec<u8>> {
    let request = params.to_request()?;
    let result = ctx.processor.process_bytes(payload, &request)?;
    result.to_png_bytes()
}

/// Retrieve a previously stored artifact by filename
///
/// # Errors
///
/// Returns [`crate::CutoutError::NotFound`] when the artifact does not
/// exist (client fault on retrieval).
pub fn fetch_artifact(ctx: &AppContext, filename: &str) -> Result<Vec<u8>> {
    ctx.store.load(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockBackendFactory, MockSegmentationBackend};
    use crate::error::CutoutError;

    #[test]
    fn test_upload_params_parsing() {
        let params = UploadParams {
            background: Some("#ff00aa".to_string()),
            shadow: Some(true),
            alpha_mode: Some("strong".to_string()),
        };
        let request = params.to_request().unwrap();
        assert_eq!(request.background, Some(Background::Solid([255, 0, 170])));
        assert_eq!(request.shadow, Some(true));
        assert_eq!(request.alpha_mode, Some(AlphaMode::Strong));

        let empty = UploadParams::default().to_request().unwrap();
        assert_eq!(empty, RequestOptions::default());
    }

    #[test]
    fn test_upload_params_bad_color_is_client_fault() {
        let params = UploadParams {
            background: Some("notacolor".to_string()),
            ..UploadParams::default()
        };
        let err = params.to_request().unwrap_err();
        assert!(matches!(err, CutoutError::InvalidColor(_)));
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_upload_params_deserialize_from_form_json() {
        let params: UploadParams =
            serde_json::from_str(r#"{"background": "white", "shadow": false}"#).unwrap();
        assert_eq!(params.background.as_deref(), Some("white"));
        assert_eq!(params.shadow, Some(false));
        assert_eq!(params.alpha_mode, None);
    }

    #[test]
    fn test_download_url_building() {
        let response = UploadResponse {
            status: "success".to_string(),
            filename: "abc.png".to_string(),
            width: 10,
            height: 20,
        };
        assert_eq!(
            response.download_url("http://localhost:8000/"),
            "http://localhost:8000/download/abc.png"
        );
        assert_eq!(
            response.download_url("https://api.example.com"),
            "https://api.example.com/download/abc.png"
        );
    }

    #[test]
    fn test_handle_upload_streamed_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = AppContext::new(
            PipelineConfig::default(),
            Box::new(MockBackendFactory::new(
                MockSegmentationBackend::centered_square(0.5),
            )),
            dir.path(),
        )
        .unwrap();

        let upload = {
            let img = image::RgbaImage::from_pixel(20, 20, image::Rgba([0, 0, 255, 255]));
            let mut bytes = Vec::new();
            img.write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
            bytes
        };

        let png = handle_upload_streamed(&ctx, &upload, &UploadParams::default()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (20, 20));
        assert_eq!(decoded.get_pixel(10, 10).0[3], 255);
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
    }
}
