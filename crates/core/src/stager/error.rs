//! Error types for destination staging.

use std::path::PathBuf;
use thiserror::Error;

use crate::media_store::MediaStoreError;

/// Errors that can occur while allocating or finalizing a destination.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The source has no usable base name to derive an output name from.
    #[error("Cannot derive an output name from {path}")]
    InvalidSourceName { path: PathBuf },

    /// Failed to create the destination file.
    #[error("Failed to create destination: {path}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy source bytes into the staged record.
    #[error("Failed to copy {source_path} into {destination}")]
    CopyFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// The media index rejected an operation.
    #[error("Media store error: {0}")]
    Store(#[from] MediaStoreError),

    /// The destination has no record but the strategy needs one.
    #[error("Destination {path} has no media record")]
    MissingRecord { path: PathBuf },

    /// The staged-record strategy was requested without a media index.
    #[error("staged_record storage requires a media index")]
    NoMediaIndex,

    /// Staging was abandoned because the job was cancelled.
    #[error("Staging cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    /// Creates a copy failed error.
    pub fn copy_failed(source_path: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed {
            source_path,
            destination,
            error,
        }
    }

    /// Returns true if this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StagingError::CreateFailed {
            path: PathBuf::from("/out/1_a.mp4"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/out/1_a.mp4"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(StagingError::Cancelled.is_cancelled());
        assert!(!StagingError::Io(std::io::Error::other("x")).is_cancelled());
    }
}
