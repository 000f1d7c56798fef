//! Media index trait.

use std::fs::File;

use super::error::MediaStoreError;
use super::types::{MediaRecord, NewRecord, RecordHandle};

/// Storage provider surface of a host-managed media index.
///
/// All methods block; async callers run them on the blocking pool.
pub trait MediaStore: Send + Sync {
    /// Inserts a record in the pending state and reserves its data file.
    fn insert_pending_record(&self, request: &NewRecord) -> Result<MediaRecord, MediaStoreError>;

    /// Opens the record's data file for writing, truncating it.
    fn open_writable(&self, handle: &RecordHandle) -> Result<File, MediaStoreError>;

    /// Flips a pending record to visible.
    fn mark_visible(&self, handle: &RecordHandle) -> Result<MediaRecord, MediaStoreError>;

    /// Deletes a record and its data file.
    ///
    /// Returns `Ok(false)` when the record was already gone.
    fn delete_record(&self, handle: &RecordHandle) -> Result<bool, MediaStoreError>;

    /// Fetches a record regardless of visibility.
    fn get(&self, handle: &RecordHandle) -> Result<Option<MediaRecord>, MediaStoreError>;

    /// Lists visible records, newest first.
    fn list_visible(&self) -> Result<Vec<MediaRecord>, MediaStoreError>;

    /// Lists pending records.
    fn list_pending(&self) -> Result<Vec<MediaRecord>, MediaStoreError>;

    /// Deletes every pending record, returning how many were removed.
    fn purge_pending(&self) -> Result<usize, MediaStoreError> {
        let mut purged = 0;
        for record in self.list_pending()? {
            if self.delete_record(&record.handle())? {
                purged += 1;
            }
        }
        Ok(purged)
    }
}
