//! Types for destination staging.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media_store::RecordHandle;

/// Whether a destination is surfaced by media listings yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Pending,
    Visible,
}

/// How a destination is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    DirectFile,
    StagedRecord,
}

/// Output location allocated for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Path the engine writes to.
    pub path: PathBuf,
    /// File name shown to the user.
    pub display_name: String,
    pub visibility: Visibility,
    pub storage_kind: StorageKind,
    /// Media index record backing a staged destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordHandle>,
}

impl Destination {
    pub fn is_visible(&self) -> bool {
        self.visibility == Visibility::Visible
    }
}
