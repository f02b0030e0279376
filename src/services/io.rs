//! Image I/O operations and output artifact persistence
//!
//! Separates file I/O from pipeline logic so the processor and handlers
//! stay testable against in-memory buffers.

use crate::error::{CutoutError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Service for handling image input operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an uploaded payload into an image
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Decode`] when the bytes are not a readable
    /// image in any supported format; this is classified as a client
    /// fault.
    pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(CutoutError::decode("empty payload"));
        }
        image::load_from_memory(bytes)
            .map_err(|e| CutoutError::image_decode("unreadable upload", &e))
    }

    /// Load an image from a file path
    ///
    /// Tries extension-based format detection first, then falls back to
    /// content-based detection so mislabeled files still load.
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Io`] when the file cannot be read and
    /// [`CutoutError::Decode`] when it cannot be decoded either way.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(extension_err) => {
                log::debug!(
                    "extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    extension_err
                );
                let data = std::fs::read(path_ref)?;
                image::load_from_memory(&data).map_err(|content_err| {
                    CutoutError::decode(format!(
                        "'{}' failed both extension-based ({extension_err}) and content-based ({content_err}) decoding",
                        path_ref.display()
                    ))
                })
            },
        }
    }
}

/// Persistent store for output PNGs
///
/// Artifacts live flat under one output directory with globally unique
/// names (`<uuid-v4>.png`), are written once, and are never mutated.
/// Retrieval is by filename; absence is a client-fault `NotFound`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    /// Open a store rooted at `output_dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Io`] when the directory cannot be created.
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// The directory artifacts are written under
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persist encoded PNG bytes under a fresh unique filename
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Io`] for write failures.
    pub fn store_png(&self, png_bytes: &[u8]) -> Result<String> {
        let filename = format!("{}.png", Uuid::new_v4());
        let path = self.output_dir.join(&filename);
        std::fs::write(&path, png_bytes)?;
        log::debug!("stored artifact at {}", path.display());
        Ok(filename)
    }

    /// Load a previously stored artifact by filename
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::NotFound`] when the filename is missing or
    /// is not a plain filename (path traversal attempts are treated the
    /// same as absent artifacts).
    pub fn load(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.artifact_path(filename)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CutoutError::not_found(filename)
            } else {
                CutoutError::Io(e)
            }
        })
    }

    /// Whether an artifact exists
    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.artifact_path(filename)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn artifact_path(&self, filename: &str) -> Result<PathBuf> {
        let valid = !filename.is_empty()
            && !filename.contains(|c| c == '/' || c == '\\')
            && filename != "."
            && filename != "..";
        if !valid {
            return Err(CutoutError::not_found(filename));
        }
        Ok(self.output_dir.join(filename))
    }
}
