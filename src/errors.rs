// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture pipeline
//!
//! Errors fall into two classes:
//!
//! - **Per-frame** (`InvalidFrameShape`, `EncodingFailure`,
//!   `StorageWriteFailure`): recovered locally, the frame or save job is
//!   dropped and processing continues.
//! - **Session** (`InsufficientStorage`, `CaptureUnavailable`,
//!   `WorkerUnavailable`): terminate the pipeline with a single explicit error.

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Capture pipeline error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Raw buffer does not match its declared dimensions
    InvalidFrameShape {
        width: u32,
        height: u32,
        len: usize,
        reason: &'static str,
    },
    /// Compressor or decompressor rejected the frame
    EncodingFailure(String),
    /// Writing a frame to storage failed
    StorageWriteFailure(String),
    /// Not enough free space to start a session
    InsufficientStorage { available: u64, required: u64 },
    /// No capture device could be opened or it stopped delivering frames
    CaptureUnavailable(String),
    /// The background save worker could not be started
    WorkerUnavailable(String),
}

impl PipelineError {
    /// Whether this error ends the capture session
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::InsufficientStorage { .. }
                | PipelineError::CaptureUnavailable(_)
                | PipelineError::WorkerUnavailable(_)
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidFrameShape {
                width,
                height,
                len,
                reason,
            } => write!(
                f,
                "Invalid frame shape {}x{} ({} bytes): {}",
                width, height, len, reason
            ),
            PipelineError::EncodingFailure(msg) => write!(f, "Encoding failed: {}", msg),
            PipelineError::StorageWriteFailure(msg) => write!(f, "Storage write failed: {}", msg),
            PipelineError::InsufficientStorage {
                available,
                required,
            } => write!(
                f,
                "Insufficient storage: {} bytes available, {} required",
                available, required
            ),
            PipelineError::CaptureUnavailable(msg) => write!(f, "Capture unavailable: {}", msg),
            PipelineError::WorkerUnavailable(msg) => write!(f, "Save worker unavailable: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::StorageWriteFailure(err.to_string())
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::EncodingFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_classification() {
        assert!(
            PipelineError::InsufficientStorage {
                available: 1,
                required: 2
            }
            .is_session_fatal()
        );
        assert!(PipelineError::CaptureUnavailable("gone".into()).is_session_fatal());
        assert!(!PipelineError::EncodingFailure("bad".into()).is_session_fatal());
        assert!(!PipelineError::StorageWriteFailure("full".into()).is_session_fatal());
    }

    #[test]
    fn test_io_error_maps_to_storage_failure() {
        let err: PipelineError = std::io::Error::other("disk full").into();
        assert!(matches!(err, PipelineError::StorageWriteFailure(msg) if msg.contains("disk full")));
    }

    #[test]
    fn test_image_error_maps_to_encoding_failure() {
        let err: PipelineError =
            image::load_from_memory_with_format(b"not a jpeg", image::ImageFormat::Jpeg)
                .unwrap_err()
                .into();
        assert!(matches!(err, PipelineError::EncodingFailure(_)));
        assert!(!err.is_session_fatal());
    }
}
