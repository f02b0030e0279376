//! Error types for the cutout compositing pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error taxonomy for the upload-to-PNG pipeline
///
/// Each failure mode a caller must distinguish gets its own variant so
/// frontends can map errors to a client-fault or server-fault response
/// instead of funneling everything through a catch-all handler.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The uploaded payload could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The background specification is neither "transparent", hex, nor a known name
    #[error("Invalid background color: {0}")]
    InvalidColor(String),

    /// The external segmentation backend failed
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// A requested output artifact does not exist
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Invalid configuration or request parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal failure (compositing bug, encoder failure)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CutoutError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new invalid color error
    pub fn invalid_color<S: Into<String>>(msg: S) -> Self {
        Self::InvalidColor(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a decode error with source context from the image crate
    pub fn image_decode(context: &str, error: &image::ImageError) -> Self {
        Self::Decode(format!("{context}: {error}"))
    }

    /// Whether the failure was caused by the caller's input
    ///
    /// Client faults: malformed uploads, unparseable background
    /// specifications, invalid request parameters, and retrieval of
    /// artifacts that do not exist. Everything else is a server fault.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InvalidColor(_) | Self::NotFound(_) | Self::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = CutoutError::decode("truncated PNG");
        assert_eq!(err.to_string(), "Failed to decode image: truncated PNG");

        let err = CutoutError::invalid_color("notacolor");
        assert!(err.to_string().contains("notacolor"));

        let err = CutoutError::segmentation("model session crashed");
        assert!(err.to_string().contains("model session crashed"));
    }

    #[test]
    fn test_fault_classification() {
        assert!(CutoutError::decode("bad upload").is_client_fault());
        assert!(CutoutError::invalid_color("x").is_client_fault());
        assert!(CutoutError::not_found("missing.png").is_client_fault());
        assert!(CutoutError::invalid_config("bad alpha mode").is_client_fault());

        assert!(!CutoutError::segmentation("adapter down").is_client_fault());
        assert!(!CutoutError::internal("compositor bug").is_client_fault());
        let io_err = CutoutError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(!io_err.is_client_fault());
    }
}
