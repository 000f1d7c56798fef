//! Types for the media index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque handle to a record in the media index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordHandle {
    pub id: i64,
}

/// Request to insert a new pending record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// File name shown in listings.
    pub display_name: String,
    /// MIME type, e.g. `video/mp4`.
    pub mime_type: String,
    /// Folder below the index root, e.g. `Movies`.
    pub relative_path: String,
}

/// A record in the media index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
    /// Where the record's bytes live on disk.
    pub data_path: PathBuf,
    /// Pending records are hidden from listings and lookups.
    pub pending: bool,
    /// Size recorded when the record was made visible.
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn handle(&self) -> RecordHandle {
        RecordHandle { id: self.id }
    }

    /// Reference that resolves back to this record through the content index.
    pub fn content_uri(&self, authority: &str) -> String {
        format!("content://{}/{}", authority, self.id)
    }
}
