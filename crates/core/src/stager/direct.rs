//! Direct-file staging into a public directory.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::StagingError;
use super::naming;
use super::traits::DestinationStager;
use super::types::{Destination, StorageKind, Visibility};
use crate::engine::QualityConfig;
use crate::source::ResolvedInput;

/// Writes outputs straight into a public directory. Outputs are visible at once.
pub struct DirectFileStager {
    public_dir: PathBuf,
}

impl DirectFileStager {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }
}

#[async_trait]
impl DestinationStager for DirectFileStager {
    fn name(&self) -> &str {
        "direct_file"
    }

    fn storage_kind(&self) -> StorageKind {
        StorageKind::DirectFile
    }

    async fn allocate(
        &self,
        _quality: &QualityConfig,
        input: &ResolvedInput,
        cancel: &CancellationToken,
    ) -> Result<Destination, StagingError> {
        if cancel.is_cancelled() {
            return Err(StagingError::Cancelled);
        }

        let display_name =
            naming::output_name(&input.path).ok_or_else(|| StagingError::InvalidSourceName {
                path: input.path.clone(),
            })?;

        fs::create_dir_all(&self.public_dir)
            .await
            .map_err(|e| StagingError::CreateFailed {
                path: self.public_dir.clone(),
                source: e,
            })?;

        let path = self.public_dir.join(&display_name);

        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed pre-existing output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StagingError::CreateFailed { path, source: e });
            }
        }

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StagingError::CreateFailed {
                path: path.clone(),
                source: e,
            })?;

        info!(path = %path.display(), "Allocated direct-file destination");

        Ok(Destination {
            path,
            display_name,
            visibility: Visibility::Visible,
            storage_kind: StorageKind::DirectFile,
            record: None,
        })
    }

    async fn finalize(&self, _destination: &mut Destination) -> Result<(), StagingError> {
        Ok(())
    }

    async fn rollback(&self, destination: &Destination) -> Result<bool, StagingError> {
        match fs::remove_file(&destination.path).await {
            Ok(()) => {
                debug!(path = %destination.path.display(), "Removed direct-file destination");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StagingError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn input(temp: &TempDir, name: &str) -> ResolvedInput {
        let path = temp.path().join(name);
        std::fs::write(&path, b"source").unwrap();
        ResolvedInput {
            path,
            size_bytes: 6,
        }
    }

    #[tokio::test]
    async fn test_allocate_creates_visible_file() {
        let temp = TempDir::new().unwrap();
        let stager = DirectFileStager::new(temp.path().join("Downloads"));
        let input = input(&temp, "clip.mp4");

        let dest = stager
            .allocate(&QualityConfig::default(), &input, &CancellationToken::new())
            .await
            .unwrap();

        assert!(dest.path.exists());
        assert!(dest.path.starts_with(temp.path().join("Downloads")));
        assert!(dest.display_name.ends_with("_clip.mp4"));
        assert_eq!(dest.visibility, Visibility::Visible);
        assert_eq!(dest.storage_kind, StorageKind::DirectFile);
        assert!(dest.record.is_none());
    }

    #[tokio::test]
    async fn test_allocate_cancelled() {
        let temp = TempDir::new().unwrap();
        let stager = DirectFileStager::new(temp.path().join("Downloads"));
        let input = input(&temp, "clip.mp4");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = stager
            .allocate(&QualityConfig::default(), &input, &cancel)
            .await;
        assert!(matches!(result, Err(StagingError::Cancelled)));
    }

    #[tokio::test]
    async fn test_allocate_fails_when_dir_is_a_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("Downloads");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let stager = DirectFileStager::new(&blocker);
        let input = input(&temp, "clip.mp4");

        let err = assert_err!(
            stager
                .allocate(&QualityConfig::default(), &input, &CancellationToken::new())
                .await
        );
        assert!(matches!(err, StagingError::CreateFailed { .. }));
    }

    #[tokio::test]
    async fn test_rollback_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let stager = DirectFileStager::new(temp.path());
        let input = input(&temp, "clip.mp4");

        let dest = assert_ok!(
            stager
                .allocate(&QualityConfig::default(), &input, &CancellationToken::new())
                .await
        );

        assert!(assert_ok!(stager.rollback(&dest).await));
        assert!(!dest.path.exists());
        assert!(!assert_ok!(stager.rollback(&dest).await));
        // Source is untouched
        assert!(input.path.exists());
    }
}
