//! Destination staging: where a job's output is written and when it becomes visible.
//!
//! Two strategies implement [`DestinationStager`]:
//!
//! - [`DirectFileStager`] creates a uniquely named file in a public directory.
//!   The file is visible immediately and rollback deletes it.
//! - [`StagedRecordStager`] inserts a pending record in a [`MediaStore`], copies
//!   the source into it, and flips it visible on finalize. Rollback deletes the
//!   record and its data file; [`DestinationStager::recover`] purges records a
//!   crashed process left pending.
//!
//! The strategy is chosen once with [`create_stager`] and never mixed within a job.

mod config;
mod direct;
mod error;
pub mod naming;
mod staged;
mod traits;
mod types;

use std::sync::Arc;
use tracing::info;

use crate::media_store::MediaStore;

pub use config::{MediaIndexConfig, StorageConfig, StorageStrategy};
pub use direct::DirectFileStager;
pub use error::StagingError;
pub use staged::StagedRecordStager;
pub use traits::DestinationStager;
pub use types::{Destination, StorageKind, Visibility};

/// Builds the stager selected by `config`.
///
/// `Auto` picks the staged-record strategy when a media store is available.
pub fn create_stager(
    config: &StorageConfig,
    store: Option<Arc<dyn MediaStore>>,
) -> Result<Arc<dyn DestinationStager>, StagingError> {
    let stager: Arc<dyn DestinationStager> = match (config.strategy, store) {
        (StorageStrategy::StagedRecord | StorageStrategy::Auto, Some(store)) => {
            Arc::new(StagedRecordStager::new(store, config))
        }
        (StorageStrategy::StagedRecord, None) => {
            return Err(StagingError::NoMediaIndex);
        }
        (StorageStrategy::DirectFile | StorageStrategy::Auto, _) => {
            Arc::new(DirectFileStager::new(&config.public_dir))
        }
    };

    info!(stager = stager.name(), "Selected storage strategy");
    Ok(stager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_store::SqliteMediaStore;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> Arc<dyn MediaStore> {
        Arc::new(SqliteMediaStore::in_memory(temp.path()).unwrap())
    }

    #[test]
    fn test_auto_without_store_is_direct() {
        let stager = create_stager(&StorageConfig::default(), None).unwrap();
        assert_eq!(stager.storage_kind(), StorageKind::DirectFile);
    }

    #[test]
    fn test_auto_with_store_is_staged() {
        let temp = TempDir::new().unwrap();
        let stager = create_stager(&StorageConfig::default(), Some(store(&temp))).unwrap();
        assert_eq!(stager.storage_kind(), StorageKind::StagedRecord);
    }

    #[test]
    fn test_direct_file_ignores_store() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::default().with_strategy(StorageStrategy::DirectFile);
        let stager = create_stager(&config, Some(store(&temp))).unwrap();
        assert_eq!(stager.storage_kind(), StorageKind::DirectFile);
    }

    #[test]
    fn test_staged_record_requires_store() {
        let config = StorageConfig::default().with_strategy(StorageStrategy::StagedRecord);
        assert!(matches!(
            create_stager(&config, None),
            Err(StagingError::NoMediaIndex)
        ));
    }
}
