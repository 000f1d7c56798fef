//! Error types for source resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving a source reference.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The reference no longer points at anything.
    #[error("Source reference is stale: {reference}")]
    Stale { reference: String },

    /// The file exists but cannot be read.
    #[error("Permission denied reading source: {path}")]
    PermissionDenied { path: PathBuf },

    /// The reference resolved to something that is not a regular file.
    #[error("Source is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// No local path can be derived from the reference.
    #[error("No local path for {reference}: {reason}")]
    NoLocalPath { reference: String, reason: String },

    /// The reference uses a scheme this resolver does not understand.
    #[error("Unsupported source scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// The content index failed while looking up the reference.
    #[error("Content index lookup failed: {0}")]
    Index(String),

    /// I/O error while validating the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resolution was abandoned because the job was cancelled.
    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolutionError {
    /// Creates a stale reference error.
    pub fn stale(reference: impl Into<String>) -> Self {
        Self::Stale {
            reference: reference.into(),
        }
    }

    /// Creates a no-local-path error.
    pub fn no_local_path(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoLocalPath {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Maps an I/O error raised while inspecting `path` into the resolution taxonomy.
    pub fn from_io(reference: &str, path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::stale(reference),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io(error),
        }
    }
}
