//! Configuration types for the compositing pipeline
//!
//! The service iterations this crate replaces disagreed on several
//! defaults (shadow on or off, model variant, pre-segmentation resize).
//! Those are deployment choices: every one of them is an explicit field
//! here, merged with per-request overrides at processing time.

use crate::{
    color::Background,
    compositor::ShadowSpec,
    error::{CutoutError, Result},
    segmentation::{AlphaMode, SegmentationConfig},
};
use serde::{Deserialize, Serialize};

/// Deployment configuration for the upload pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Segmentation model configuration
    pub segmentation: SegmentationConfig,

    /// Whether requests composite a shadow when they don't say otherwise
    pub shadow_enabled: bool,

    /// Shadow parameters used whenever the shadow pass runs
    pub shadow: ShadowSpec,

    /// Background applied when requests don't specify one
    pub background: Background,

    /// Alpha-matting threshold preset for requests that don't select one
    pub alpha_mode: AlphaMode,

    /// Whether alpha-matting refinement is requested from the backend
    pub alpha_matting: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            shadow_enabled: false,
            shadow: ShadowSpec::default(),
            background: Background::Transparent,
            alpha_mode: AlphaMode::Standard,
            alpha_matting: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::InvalidConfig`] for an empty model name, a
    /// zero resize bound, or out-of-range shadow parameters.
    pub fn validate(&self) -> Result<()> {
        if self.segmentation.model_name.trim().is_empty() {
            return Err(CutoutError::invalid_config("model name must not be empty"));
        }
        if self.segmentation.resize_to == Some(0) {
            return Err(CutoutError::invalid_config(
                "resize bound must be at least 1 pixel",
            ));
        }
        self.shadow.validate()
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Set the segmentation model variant name
    #[must_use]
    pub fn model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.segmentation.model_name = name.into();
        self
    }

    /// Bound input size before segmentation (aspect-preserving)
    #[must_use]
    pub fn resize_to(mut self, bound: u32) -> Self {
        self.config.segmentation.resize_to = Some(bound);
        self
    }

    /// Enable or disable the shadow pass by default
    #[must_use]
    pub fn shadow_enabled(mut self, enabled: bool) -> Self {
        self.config.shadow_enabled = enabled;
        self
    }

    /// Set the shadow parameters
    #[must_use]
    pub fn shadow(mut self, shadow: ShadowSpec) -> Self {
        self.config.shadow = shadow;
        self
    }

    /// Set the default background
    #[must_use]
    pub fn background(mut self, background: Background) -> Self {
        self.config.background = background;
        self
    }

    /// Set the default alpha-matting preset
    #[must_use]
    pub fn alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.config.alpha_mode = mode;
        self
    }

    /// Enable or disable alpha-matting refinement
    #[must_use]
    pub fn alpha_matting(mut self, enabled: bool) -> Self {
        self.config.alpha_matting = enabled;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::InvalidConfig`] when validation fails.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.shadow_enabled);
        assert_eq!(config.background, Background::Transparent);
        assert_eq!(config.segmentation.model_name, "u2net");
        assert_eq!(config.segmentation.resize_to, None);
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig::builder()
            .model_name("u2netp")
            .resize_to(1024)
            .shadow_enabled(true)
            .shadow(ShadowSpec::default().with_opacity(0.5))
            .background(Background::Solid([255, 255, 255]))
            .alpha_mode(AlphaMode::Strong)
            .alpha_matting(true)
            .build()
            .unwrap();

        assert_eq!(config.segmentation.model_name, "u2netp");
        assert_eq!(config.segmentation.resize_to, Some(1024));
        assert!(config.shadow_enabled);
        assert!((config.shadow.opacity - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.background, Background::Solid([255, 255, 255]));
        assert_eq!(config.alpha_mode, AlphaMode::Strong);
        assert!(config.alpha_matting);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(PipelineConfig::builder().model_name("").build().is_err());
        assert!(PipelineConfig::builder().resize_to(0).build().is_err());
        assert!(PipelineConfig::builder()
            .shadow(ShadowSpec::default().with_opacity(2.0))
            .build()
            .is_err());
    }
}
