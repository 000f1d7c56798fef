//! Mock destination stager for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::engine::QualityConfig;
use crate::source::ResolvedInput;
use crate::stager::{naming, Destination, DestinationStager, StagingError, StorageKind, Visibility};

/// Counts of stager calls, for assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagerCalls {
    pub allocate: usize,
    pub finalize: usize,
    pub rollback: usize,
    pub recover: usize,
}

/// Mock implementation of the DestinationStager trait.
///
/// Allocates pending files under a directory and tracks calls. Errors can be
/// injected for allocate and finalize.
#[derive(Debug)]
pub struct MockStager {
    dir: PathBuf,
    calls: Arc<RwLock<StagerCalls>>,
    allocate_error: Arc<RwLock<Option<StagingError>>>,
    finalize_error: Arc<RwLock<Option<StagingError>>>,
}

impl MockStager {
    /// Create a mock stager writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            calls: Arc::new(RwLock::new(StagerCalls::default())),
            allocate_error: Arc::new(RwLock::new(None)),
            finalize_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get call counts.
    pub async fn calls(&self) -> StagerCalls {
        self.calls.read().await.clone()
    }

    /// Configure the next allocate to fail with the given error.
    pub async fn set_allocate_error(&self, error: StagingError) {
        *self.allocate_error.write().await = Some(error);
    }

    /// Configure the next finalize to fail with the given error.
    pub async fn set_finalize_error(&self, error: StagingError) {
        *self.finalize_error.write().await = Some(error);
    }
}

#[async_trait]
impl DestinationStager for MockStager {
    fn name(&self) -> &str {
        "mock"
    }

    fn storage_kind(&self) -> StorageKind {
        StorageKind::StagedRecord
    }

    async fn allocate(
        &self,
        _quality: &QualityConfig,
        input: &ResolvedInput,
        cancel: &CancellationToken,
    ) -> Result<Destination, StagingError> {
        self.calls.write().await.allocate += 1;

        if let Some(err) = self.allocate_error.write().await.take() {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(StagingError::Cancelled);
        }

        let display_name =
            naming::output_name(&input.path).ok_or_else(|| StagingError::InvalidSourceName {
                path: input.path.clone(),
            })?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&display_name);
        tokio::fs::write(&path, b"").await?;

        Ok(Destination {
            path,
            display_name,
            visibility: Visibility::Pending,
            storage_kind: StorageKind::StagedRecord,
            record: None,
        })
    }

    async fn finalize(&self, destination: &mut Destination) -> Result<(), StagingError> {
        self.calls.write().await.finalize += 1;

        if let Some(err) = self.finalize_error.write().await.take() {
            return Err(err);
        }
        destination.visibility = Visibility::Visible;
        Ok(())
    }

    async fn rollback(&self, destination: &Destination) -> Result<bool, StagingError> {
        self.calls.write().await.rollback += 1;

        match tokio::fs::remove_file(&destination.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn recover(&self) -> Result<usize, StagingError> {
        self.calls.write().await.recover += 1;
        Ok(0)
    }
}
