//! Staged-record strategy backed by a media index.

use async_trait::async_trait;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::StorageConfig;
use super::error::StagingError;
use super::naming;
use super::traits::DestinationStager;
use super::types::{Destination, StorageKind, Visibility};
use crate::engine::QualityConfig;
use crate::media_store::{MediaRecord, MediaStore, NewRecord, RecordHandle};
use crate::metrics;
use crate::source::ResolvedInput;

/// Stages outputs as pending records that only become visible on finalize.
pub struct StagedRecordStager {
    store: Arc<dyn MediaStore>,
    relative_path: String,
    mime_type: String,
    buffer_size: usize,
}

impl StagedRecordStager {
    pub fn new(store: Arc<dyn MediaStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            relative_path: config.relative_path.clone(),
            mime_type: config.mime_type.clone(),
            buffer_size: config.buffer_size.max(1),
        }
    }

    /// Inserts the pending record and fills it from `source`.
    ///
    /// Any failure or cancellation deletes the record before returning.
    fn stage_blocking(
        store: &dyn MediaStore,
        request: NewRecord,
        source: &Path,
        buffer_size: usize,
        cancel: &CancellationToken,
    ) -> Result<MediaRecord, StagingError> {
        let record = store.insert_pending_record(&request)?;

        match Self::copy_into(store, &record, source, buffer_size, cancel) {
            Ok(bytes) => {
                metrics::BYTES_STAGED.inc_by(bytes);
                debug!(id = record.id, bytes, "Staged source bytes into record");
                Ok(record)
            }
            Err(e) => {
                if let Err(delete_err) = store.delete_record(&record.handle()) {
                    warn!(id = record.id, error = %delete_err, "Failed to delete record after staging error");
                }
                Err(e)
            }
        }
    }

    fn copy_into(
        store: &dyn MediaStore,
        record: &MediaRecord,
        source: &Path,
        buffer_size: usize,
        cancel: &CancellationToken,
    ) -> Result<u64, StagingError> {
        let copy_failed =
            |e| StagingError::copy_failed(source.to_path_buf(), record.data_path.clone(), e);

        let mut reader = File::open(source).map_err(copy_failed)?;
        let mut writer = store.open_writable(&record.handle())?;

        let mut buffer = vec![0u8; buffer_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(copy_failed)?;
            if bytes_read == 0 {
                break;
            }

            if cancel.is_cancelled() {
                return Err(StagingError::Cancelled);
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(copy_failed)?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().map_err(copy_failed)?;
        Ok(total_bytes)
    }

    fn record_of(destination: &Destination) -> Result<RecordHandle, StagingError> {
        destination.record.ok_or_else(|| StagingError::MissingRecord {
            path: destination.path.clone(),
        })
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, StagingError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn MediaStore>) -> Result<T, StagingError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(store))
            .await
            .map_err(|e| StagingError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl DestinationStager for StagedRecordStager {
    fn name(&self) -> &str {
        "staged_record"
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
        if cancel.is_cancelled() {
            return Err(StagingError::Cancelled);
        }

        let display_name =
            naming::output_name(&input.path).ok_or_else(|| StagingError::InvalidSourceName {
                path: input.path.clone(),
            })?;

        let request = NewRecord {
            display_name: display_name.clone(),
            mime_type: self.mime_type.clone(),
            relative_path: self.relative_path.clone(),
        };
        let source = input.path.clone();
        let buffer_size = self.buffer_size;
        let cancel = cancel.clone();

        // The copy checks the token itself; the record is gone before Cancelled returns.
        let record = self
            .blocking(move |store| {
                Self::stage_blocking(store.as_ref(), request, &source, buffer_size, &cancel)
            })
            .await?;

        info!(id = record.id, path = %record.data_path.display(), "Allocated staged-record destination");

        Ok(Destination {
            path: record.data_path.clone(),
            display_name,
            visibility: Visibility::Pending,
            storage_kind: StorageKind::StagedRecord,
            record: Some(record.handle()),
        })
    }

    async fn finalize(&self, destination: &mut Destination) -> Result<(), StagingError> {
        let handle = Self::record_of(destination)?;
        let record = self
            .blocking(move |store| Ok(store.mark_visible(&handle)?))
            .await?;

        destination.visibility = Visibility::Visible;
        info!(id = record.id, size_bytes = record.size_bytes, "Published staged record");
        Ok(())
    }

    async fn rollback(&self, destination: &Destination) -> Result<bool, StagingError> {
        let handle = Self::record_of(destination)?;
        let path = destination.path.clone();
        self.blocking(move |store| {
            if store.delete_record(&handle)? {
                return Ok(true);
            }
            // A data file without a record is invisible to recover.
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    warn!(id = handle.id, path = %path.display(), "Removed data file of a deleted record");
                    Ok(true)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StagingError::Io(e)),
            }
        })
        .await
    }

    async fn recover(&self) -> Result<usize, StagingError> {
        let purged = self
            .blocking(|store| Ok(store.purge_pending()?))
            .await?;
        if purged > 0 {
            info!(purged, "Purged pending records left by an earlier run");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_store::SqliteMediaStore;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: Arc<SqliteMediaStore>,
        stager: StagedRecordStager,
        input: ResolvedInput,
    }

    fn fixture(source_len: usize) -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteMediaStore::in_memory(temp.path().join("media")).unwrap());
        let stager = StagedRecordStager::new(store.clone(), &StorageConfig::default());

        let path = temp.path().join("clip.mp4");
        std::fs::write(&path, vec![7u8; source_len]).unwrap();
        let input = ResolvedInput {
            path,
            size_bytes: source_len as u64,
        };

        Fixture {
            _temp: temp,
            store,
            stager,
            input,
        }
    }

    #[tokio::test]
    async fn test_allocate_stages_pending_copy() {
        let f = fixture(10_000);

        let dest = f
            .stager
            .allocate(&QualityConfig::default(), &f.input, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dest.visibility, Visibility::Pending);
        assert_eq!(dest.storage_kind, StorageKind::StagedRecord);
        assert_eq!(std::fs::metadata(&dest.path).unwrap().len(), 10_000);
        assert!(f.store.list_visible().unwrap().is_empty());
        assert_eq!(f.store.list_pending().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_makes_record_visible() {
        let f = fixture(512);
        let mut dest = f
            .stager
            .allocate(&QualityConfig::default(), &f.input, &CancellationToken::new())
            .await
            .unwrap();

        f.stager.finalize(&mut dest).await.unwrap();

        assert_eq!(dest.visibility, Visibility::Visible);
        let visible = f.store.list_visible().unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].display_name, dest.display_name);
        assert!(f.store.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_allocation_leaves_no_record() {
        let f = fixture(512);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = f
            .stager
            .allocate(&QualityConfig::default(), &f.input, &cancel)
            .await;

        assert!(matches!(result, Err(StagingError::Cancelled)));
        assert!(f.store.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_copy_deletes_record() {
        let f = fixture(64);
        let cancel = CancellationToken::new();
        let request = NewRecord {
            display_name: "1_clip.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            relative_path: "Movies".to_string(),
        };
        cancel.cancel();

        let result = StagedRecordStager::stage_blocking(
            f.store.as_ref(),
            request,
            &f.input.path,
            16,
            &cancel,
        );

        assert!(matches!(result, Err(StagingError::Cancelled)));
        assert!(f.store.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_deletes_record() {
        let f = fixture(64);
        std::fs::remove_file(&f.input.path).unwrap();

        let result = f
            .stager
            .allocate(&QualityConfig::default(), &f.input, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(StagingError::CopyFailed { .. })));
        assert!(f.store.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_is_idempotent() {
        let f = fixture(128);
        let dest = f
            .stager
            .allocate(&QualityConfig::default(), &f.input, &CancellationToken::new())
            .await
            .unwrap();

        assert!(f.stager.rollback(&dest).await.unwrap());
        assert!(!dest.path.exists());
        assert!(!f.stager.rollback(&dest).await.unwrap());
        assert!(f.store.list_pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_removes_file_recreated_after_delete() {
        let f = fixture(128);
        let dest = f
            .stager
            .allocate(&QualityConfig::default(), &f.input, &CancellationToken::new())
            .await
            .unwrap();
        assert!(f.stager.rollback(&dest).await.unwrap());

        std::fs::write(&dest.path, vec![1u8; 4096]).unwrap();

        assert!(f.stager.rollback(&dest).await.unwrap());
        assert!(!dest.path.exists());
        assert!(!f.stager.rollback(&dest).await.unwrap());
    }

    #[tokio::test]
    async fn test_recover_purges_pending() {
        let f = fixture(32);
        for _ in 0..2 {
            f.stager
                .allocate(&QualityConfig::default(), &f.input, &CancellationToken::new())
                .await
                .unwrap();
        }

        assert_eq!(f.stager.recover().await.unwrap(), 2);
        assert!(f.store.list_pending().unwrap().is_empty());
    }
}
