//! Default resolver: local pass-through plus content-index indirection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ResolutionError;
use super::traits::{ContentIndex, SourceResolver};
use super::types::{ResolvedInput, SourceKind, SourceReference};

/// Resolver supporting local paths and any number of registered content indexes.
#[derive(Default, Clone)]
pub struct MediaSourceResolver {
    indexes: HashMap<String, Arc<dyn ContentIndex>>,
}

impl MediaSourceResolver {
    /// Creates a resolver that only understands local references.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a content index under its authority.
    pub fn with_index(mut self, index: Arc<dyn ContentIndex>) -> Self {
        self.indexes.insert(index.authority().to_string(), index);
        self
    }

    /// Blocking part of resolution: lookup plus validation.
    fn resolve_blocking(
        reference: &str,
        kind: SourceKind,
        index: Option<Arc<dyn ContentIndex>>,
    ) -> Result<ResolvedInput, ResolutionError> {
        let path = match kind {
            SourceKind::LocalPath(path) => path,
            SourceKind::Indexed { authority, id } => {
                let index = index.ok_or_else(|| {
                    ResolutionError::no_local_path(
                        reference,
                        format!("no content index registered for '{}'", authority),
                    )
                })?;
                index
                    .lookup(&id)?
                    .ok_or_else(|| ResolutionError::stale(reference))?
            }
        };

        Self::validate(reference, path)
    }

    /// Confirms the path is a readable regular file and measures it.
    fn validate(reference: &str, path: PathBuf) -> Result<ResolvedInput, ResolutionError> {
        let metadata = std::fs::metadata(&path)
            .map_err(|e| ResolutionError::from_io(reference, path.clone(), e))?;

        if !metadata.is_file() {
            return Err(ResolutionError::NotAFile { path });
        }

        // Opening proves read permission; the handle is closed when it drops here.
        File::open(&path).map_err(|e| ResolutionError::from_io(reference, path.clone(), e))?;

        Ok(ResolvedInput {
            path,
            size_bytes: metadata.len(),
        })
    }
}

#[async_trait]
impl SourceResolver for MediaSourceResolver {
    fn name(&self) -> &str {
        "media"
    }

    async fn resolve(
        &self,
        source: &SourceReference,
        cancel: &CancellationToken,
    ) -> Result<ResolvedInput, ResolutionError> {
        if cancel.is_cancelled() {
            return Err(ResolutionError::Cancelled);
        }

        let kind = source.kind()?;
        let index = match &kind {
            SourceKind::Indexed { authority, .. } => self.indexes.get(authority).cloned(),
            SourceKind::LocalPath(_) => None,
        };

        debug!(source = %source, "Resolving source reference");

        let reference = source.as_str().to_string();
        let work =
            tokio::task::spawn_blocking(move || Self::resolve_blocking(&reference, kind, index));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResolutionError::Cancelled),
            joined = work => joined.map_err(|e| ResolutionError::Io(std::io::Error::other(e)))?,
        }
    }
}
