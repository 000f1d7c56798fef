//! Trait definitions for destination staging.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::StagingError;
use super::types::{Destination, StorageKind};
use crate::engine::QualityConfig;
use crate::source::ResolvedInput;

/// Allocates, finalizes and discards job outputs.
#[async_trait]
pub trait DestinationStager: Send + Sync {
    /// Returns the name of this stager implementation.
    fn name(&self) -> &str;

    /// Storage kind of every destination this stager allocates.
    fn storage_kind(&self) -> StorageKind;

    /// Allocates an output location for `input`.
    ///
    /// A cancelled or failed allocation leaves nothing behind.
    async fn allocate(
        &self,
        quality: &QualityConfig,
        input: &ResolvedInput,
        cancel: &CancellationToken,
    ) -> Result<Destination, StagingError>;

    /// Makes the destination visible after the engine reported success.
    async fn finalize(&self, destination: &mut Destination) -> Result<(), StagingError>;

    /// Deletes the destination.
    ///
    /// Returns `Ok(true)` if something was deleted and `Ok(false)` if it was
    /// already gone, so repeated calls are harmless.
    async fn rollback(&self, destination: &Destination) -> Result<bool, StagingError>;

    /// Purges destinations orphaned by an earlier process. Returns how many.
    async fn recover(&self) -> Result<usize, StagingError> {
        Ok(0)
    }
}
