//! Error types for the media index.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`super::MediaStore`].
#[derive(Debug, Error)]
pub enum MediaStoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// A record or data file already occupies the requested name.
    #[error("A media item already exists at {path}")]
    Conflict { path: PathBuf },

    /// The record does not exist.
    #[error("Media record not found: {0}")]
    NotFound(i64),

    /// The display name cannot be used as a file name.
    #[error("Invalid display name: {0}")]
    InvalidName(String),

    /// The folder is not a relative path inside the index root.
    #[error("Invalid relative path: {0}")]
    InvalidFolder(String),

    /// I/O error on the record's data file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for MediaStoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
