//! Configuration for destination staging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which staging strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Staged record when a media index is configured, direct file otherwise.
    #[default]
    Auto,
    /// Write straight into the public directory.
    DirectFile,
    /// Write into a pending media index record.
    StagedRecord,
}

/// Location of the managed media index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaIndexConfig {
    /// SQLite database holding the records.
    pub database: PathBuf,
    /// Directory below which record data files live.
    pub root: PathBuf,
}

/// Configuration for destination staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub strategy: StorageStrategy,

    /// Directory for direct-file outputs.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Folder for staged records, relative to the index root.
    #[serde(default = "default_relative_path")]
    pub relative_path: String,

    /// MIME type recorded for staged outputs.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,

    /// Buffer size for the staging copy in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_index: Option<MediaIndexConfig>,
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("Downloads")
}

fn default_relative_path() -> String {
    "Movies".to_string()
}

fn default_mime_type() -> String {
    "video/mp4".to_string()
}

fn default_buffer_size() -> usize {
    4096
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            strategy: StorageStrategy::default(),
            public_dir: default_public_dir(),
            relative_path: default_relative_path(),
            mime_type: default_mime_type(),
            buffer_size: default_buffer_size(),
            media_index: None,
        }
    }
}

impl StorageConfig {
    pub fn with_strategy(mut self, strategy: StorageStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the buffer size for the staging copy.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_media_index(mut self, database: PathBuf, root: PathBuf) -> Self {
        self.media_index = Some(MediaIndexConfig { database, root });
        self
    }
}
