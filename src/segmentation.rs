//! Segmentation backend abstraction and shared model handle
//!
//! The segmentation model is an external collaborator: this crate never
//! runs inference itself. Frontends inject a [`BackendFactory`] that
//! produces a warm [`SegmentationBackend`]; [`SharedBackend`] guarantees
//! the expensive handle is created at most once per process and reused
//! read-only across concurrent requests.

use crate::{
    error::{CutoutError, Result},
    types::Cutout,
};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Alpha-matting threshold preset selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaMode {
    /// Balanced mask crispness vs. edge softness: thresholds (240, 10, 10)
    Standard,
    /// Aggressive foreground bias: thresholds (280, 30, 20)
    Strong,
}

impl Default for AlphaMode {
    fn default() -> Self {
        Self::Standard
    }
}

impl AlphaMode {
    /// The threshold preset this mode selects
    #[must_use]
    pub fn matting_params(self) -> AlphaMattingParams {
        match self {
            Self::Standard => AlphaMattingParams {
                foreground_threshold: 240,
                background_threshold: 10,
                erode_size: 10,
            },
            Self::Strong => AlphaMattingParams {
                foreground_threshold: 280,
                background_threshold: 30,
                erode_size: 20,
            },
        }
    }
}

impl FromStr for AlphaMode {
    type Err = CutoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "strong" => Ok(Self::Strong),
            other => Err(CutoutError::invalid_config(format!(
                "unknown alpha mode '{other}', expected 'standard' or 'strong'"
            ))),
        }
    }
}

impl std::fmt::Display for AlphaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Strong => write!(f, "strong"),
        }
    }
}

/// Alpha-matting thresholds passed through to the external model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaMattingParams {
    /// Pixels above this confidence are definite foreground
    pub foreground_threshold: u32,
    /// Pixels below this confidence are definite background
    pub background_threshold: u32,
    /// Erosion kernel size for the unknown region
    pub erode_size: u32,
}

/// Per-request options forwarded to the segmentation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationOptions {
    /// Whether alpha matting refinement is enabled
    pub alpha_matting: bool,
    /// Thresholds to use when alpha matting is enabled
    pub matting: AlphaMattingParams,
}

impl SegmentationOptions {
    /// Options for a given mode with alpha matting toggled
    #[must_use]
    pub fn for_mode(mode: AlphaMode, alpha_matting: bool) -> Self {
        Self {
            alpha_matting,
            matting: mode.matting_params(),
        }
    }
}

impl Default for SegmentationOptions {
    fn default() -> Self {
        Self::for_mode(AlphaMode::Standard, false)
    }
}

/// Deployment-level segmentation configuration
///
/// Which model variant to load and whether to bound input size are
/// deployment choices, not pipeline behavior, so they live here rather
/// than being hard-coded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Model variant name (e.g. "u2net", "u2netp")
    pub model_name: String,
    /// Resize inputs to fit within this bound before segmentation
    pub resize_to: Option<u32>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_name: "u2net".to_string(),
            resize_to: None,
        }
    }
}

/// Trait for external segmentation backends
///
/// Implementations hold a warm model handle and are expected to support
/// concurrent `segment` calls (or serialize them internally); the
/// pipeline treats the handle as read-only once created.
pub trait SegmentationBackend: Send + Sync {
    /// Produce a cutout whose alpha channel encodes foreground confidence
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Segmentation`] when the model invocation
    /// fails; the pipeline surfaces this as a server fault without
    /// retrying.
    fn segment(&self, image: &DynamicImage, options: &SegmentationOptions) -> Result<Cutout>;

    /// Name of the loaded model variant
    fn model_name(&self) -> &str;
}

impl std::fmt::Debug for dyn SegmentationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationBackend")
            .field("model_name", &self.model_name())
            .finish_non_exhaustive()
    }
}

/// Factory trait for creating segmentation backends
///
/// The crate ships no real model backend; frontends inject one here.
pub trait BackendFactory: Send + Sync {
    /// Create a warm backend for the given deployment configuration
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Segmentation`] for model loading failures.
    fn create_backend(&self, config: &SegmentationConfig) -> Result<Box<dyn SegmentationBackend>>;
}

/// Process-wide lazily initialized segmentation handle
///
/// Handlers may race to trigger the first use; the mutex-guarded
/// double-checked initialization guarantees exactly one factory
/// invocation, and every subsequent `get` observes the fully initialized
/// handle through the `OnceLock`. There is no reinitialization path: the
/// model is immutable for the process lifetime.
pub struct SharedBackend {
    config: SegmentationConfig,
    factory: Box<dyn BackendFactory>,
    handle: OnceLock<Arc<dyn SegmentationBackend>>,
    init_lock: Mutex<()>,
}

impl SharedBackend {
    /// Create an uninitialized shared handle
    ///
    /// The factory is not invoked until the first [`get`](Self::get).
    #[must_use]
    pub fn new(config: SegmentationConfig, factory: Box<dyn BackendFactory>) -> Self {
        Self {
            config,
            factory,
            handle: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Get the backend, initializing it on first use
    ///
    /// # Errors
    ///
    /// Returns the factory's [`CutoutError::Segmentation`] error when
    /// initialization fails; a later call will retry initialization.
    pub fn get(&self) -> Result<Arc<dyn SegmentationBackend>> {
        if let Some(backend) = self.handle.get() {
            return Ok(Arc::clone(backend));
        }

        // The guarded section only publishes into the OnceLock, so a
        // poisoned lock cannot leave partial state behind.
        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(backend) = self.handle.get() {
            return Ok(Arc::clone(backend));
        }

        let backend: Arc<dyn SegmentationBackend> =
            Arc::from(self.factory.create_backend(&self.config)?);
        // Cannot fail: we hold the init lock and checked the cell above.
        let _ = self.handle.set(Arc::clone(&backend));
        Ok(backend)
    }

    /// Whether the handle has been created
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }

    /// The deployment configuration this handle was built with
    #[must_use]
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }
}

impl std::fmt::Debug for SharedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBackend")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
