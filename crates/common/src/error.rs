//! Common error types.

use thiserror::Error;

/// Main error type for the media wrappers and the host they drive.
#[derive(Error, Debug)]
pub enum MediafyError {
    #[error("No element matches selector: {0}")]
    NotFound(String),

    #[error("Element is no longer part of the document")]
    StaleElement,

    #[error("Element has no parent node")]
    NoParent,

    #[error("Document has no body element")]
    NoBody,

    #[error("Expected <{expected}> element, found <{found}>")]
    TagMismatch { expected: &'static str, found: String },

    #[error("Rendering context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Requested device not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediafyResult<T> = Result<T, MediafyError>;

impl MediafyError {
    pub fn not_found(selector: impl Into<String>) -> Self {
        Self::NotFound(selector.into())
    }

    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextUnavailable(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }
}
