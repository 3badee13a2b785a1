//! # Error Handling
//!
//! This module defines the error type for the `lumapipe` library.
//!
//! The variants mirror the recovery policy of the batch orchestrator:
//! classifier rejections and size-ceiling violations abort a single batch
//! item, encoding failures are absorbed locally by the original-bytes
//! fallback, and storage failures propagate to the caller unretried.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// All errors the compression pipeline can produce.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The declared container format was rejected before any payload byte
    /// was read. Carries user-facing remediation text.
    #[error("unsupported media format: {reason}")]
    UnsupportedFormat { reason: String },

    /// A provisionally accepted payload could not be decoded or re-encoded
    /// at runtime.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// A video payload exceeded its absolute size ceiling.
    #[error("media of {size} bytes exceeds the {limit} byte ceiling")]
    SizeExceeded { size: u64, limit: u64 },

    /// The blob store rejected an upload.
    #[error("storage upload failed: {0}")]
    StorageUpload(String),

    /// Preset table could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// Scratch-file plumbing for the video engine.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Encoding(err.to_string())
    }
}

impl From<ffmpeg_next::Error> for PipelineError {
    fn from(err: ffmpeg_next::Error) -> Self {
        PipelineError::Encoding(err.to_string())
    }
}
