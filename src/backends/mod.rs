//! Backend implementations for the segmentation seam
//!
//! The real model runs behind an externally injected
//! [`crate::segmentation::BackendFactory`]; this module only ships a mock
//! backend with deterministic mask patterns for tests and for frontends
//! that want to exercise the pipeline without a model.

pub mod mock;

pub use self::mock::{MockBackendFactory, MockMask, MockSegmentationBackend};
