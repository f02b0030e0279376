//! Upload handler and artifact persistence integration tests

use cutout_compose::{
    fetch_artifact, handle_upload, AppContext, CutoutError, MockBackendFactory,
    MockSegmentationBackend, PipelineConfig, Result, UploadParams,
};
use image::{Rgba, RgbaImage};
use tempfile::TempDir;

fn upload_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 10, 255]));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();
    bytes
}

fn context(dir: &TempDir) -> AppContext {
    AppContext::new(
        PipelineConfig::default(),
        Box::new(MockBackendFactory::new(
            MockSegmentationBackend::centered_square(0.5),
        )),
        dir.path(),
    )
    .unwrap()
}

#[test]
fn test_handle_upload_persists_and_describes_the_artifact() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let response = handle_upload(&ctx, &upload_png(64, 48), &UploadParams::default())?;
    assert_eq!(response.status, "success");
    assert_eq!(response.width, 64);
    assert_eq!(response.height, 48);
    assert!(response.filename.ends_with(".png"));

    // The descriptor names a real artifact that decodes to the output.
    let stored = fetch_artifact(&ctx, &response.filename)?;
    let decoded = image::load_from_memory(&stored)
        .map_err(|e| CutoutError::decode(e.to_string()))?
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (64, 48));

    // The file sits under the configured output directory.
    assert!(dir.path().join(&response.filename).is_file());
    Ok(())
}

#[test]
fn test_upload_response_serializes_to_json_descriptor() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let response = handle_upload(&ctx, &upload_png(10, 10), &UploadParams::default())?;
    let json = serde_json::to_value(&response).map_err(|e| CutoutError::internal(e.to_string()))?;

    assert_eq!(json["status"], "success");
    assert_eq!(json["width"], 10);
    assert_eq!(json["height"], 10);
    assert_eq!(
        json["filename"].as_str().unwrap(),
        response.filename.as_str()
    );

    let url = response.download_url("http://localhost:8000");
    assert!(url.starts_with("http://localhost:8000/download/"));
    assert!(url.ends_with(".png"));
    Ok(())
}

#[test]
fn test_each_upload_gets_a_unique_artifact() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let first = handle_upload(&ctx, &upload_png(8, 8), &UploadParams::default())?;
    let second = handle_upload(&ctx, &upload_png(8, 8), &UploadParams::default())?;
    assert_ne!(first.filename, second.filename);
    assert!(ctx.store.contains(&first.filename));
    assert!(ctx.store.contains(&second.filename));
    Ok(())
}

#[test]
fn test_fetch_unknown_artifact_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let err = fetch_artifact(&ctx, "00000000-0000-0000-0000-000000000000.png").unwrap_err();
    assert!(matches!(err, CutoutError::NotFound(_)));
    assert!(err.is_client_fault());
}

#[test]
fn test_invalid_params_fail_before_processing() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);

    let bad_color = UploadParams {
        background: Some("nope".to_string()),
        ..UploadParams::default()
    };
    let err = handle_upload(&ctx, &upload_png(8, 8), &bad_color).unwrap_err();
    assert!(matches!(err, CutoutError::InvalidColor(_)));

    let bad_mode = UploadParams {
        alpha_mode: Some("extreme".to_string()),
        ..UploadParams::default()
    };
    let err = handle_upload(&ctx, &upload_png(8, 8), &bad_mode).unwrap_err();
    assert!(matches!(err, CutoutError::InvalidConfig(_)));

    // Nothing should have been persisted for failed requests.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
