//! In-memory content index for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::source::{ContentIndex, ResolutionError};

/// Content index backed by a map from id to path.
#[derive(Debug)]
pub struct MemoryContentIndex {
    authority: String,
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl MemoryContentIndex {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Maps `id` to `path`.
    pub fn insert(&self, id: impl Into<String>, path: impl AsRef<Path>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), path.as_ref().to_path_buf());
    }
}

impl ContentIndex for MemoryContentIndex {
    fn authority(&self) -> &str {
        &self.authority
    }

    fn lookup(&self, id: &str) -> Result<Option<PathBuf>, ResolutionError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| ResolutionError::Index("index lock poisoned".to_string()))?;
        Ok(entries.get(id).cloned())
    }
}
