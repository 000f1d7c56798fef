//! Mock source resolver for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::source::{ResolutionError, ResolvedInput, SourceReference, SourceResolver};

/// Mock implementation of the SourceResolver trait.
///
/// Treats every reference as a local path. The reported size is the file's
/// length if it exists, or the configured fallback size otherwise.
#[derive(Debug)]
pub struct MockResolver {
    /// Recorded references.
    resolved: Arc<RwLock<Vec<SourceReference>>>,
    /// If set, the next resolve will fail with this error.
    next_error: Arc<RwLock<Option<ResolutionError>>>,
    /// Simulated lookup time. Cancellation interrupts it.
    delay: Arc<RwLock<Duration>>,
    fallback_size: Arc<RwLock<u64>>,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    /// Create a new mock resolver.
    pub fn new() -> Self {
        Self {
            resolved: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            fallback_size: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all references passed to `resolve`.
    pub async fn recorded_references(&self) -> Vec<SourceReference> {
        self.resolved.read().await.clone()
    }

    /// Configure the next resolve to fail with the given error.
    pub async fn set_next_error(&self, error: ResolutionError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated lookup time.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Size reported for references that do not exist on disk.
    pub async fn set_fallback_size(&self, size: u64) {
        *self.fallback_size.write().await = size;
    }
}

#[async_trait]
impl SourceResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(
        &self,
        source: &SourceReference,
        cancel: &CancellationToken,
    ) -> Result<ResolvedInput, ResolutionError> {
        self.resolved.write().await.push(source.clone());

        let delay = *self.delay.read().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolutionError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let path = PathBuf::from(source.as_str());
        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => *self.fallback_size.read().await,
        };

        Ok(ResolvedInput { path, size_bytes })
    }
}
