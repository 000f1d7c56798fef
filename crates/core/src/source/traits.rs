//! Trait definitions for source resolution.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use super::error::ResolutionError;
use super::types::{ResolvedInput, SourceReference};

/// A content-indexing service that maps indexed references to filesystem paths.
///
/// Lookups are blocking and are always called from the blocking pool.
pub trait ContentIndex: Send + Sync {
    /// The `content://<authority>/...` authority this index answers for.
    fn authority(&self) -> &str;

    /// Looks up the item with the given id.
    ///
    /// Returns `Ok(None)` when the index has no visible item with that id.
    fn lookup(&self, id: &str) -> Result<Option<PathBuf>, ResolutionError>;
}

/// Resolves source references into readable local inputs.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Returns the name of this resolver implementation.
    fn name(&self) -> &str;

    /// Resolves `source` into a validated local input.
    ///
    /// Implementations must return [`ResolutionError::Cancelled`] promptly once
    /// `cancel` fires and must not leak handles opened for the abandoned work.
    async fn resolve(
        &self,
        source: &SourceReference,
        cancel: &CancellationToken,
    ) -> Result<ResolvedInput, ResolutionError>;
}
