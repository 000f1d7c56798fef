//! Host-managed media index.
//!
//! The index is the storage provider surface used by the staged-record
//! strategy: records are inserted as pending, written through a writable
//! handle, and flipped visible once their content is complete. Pending
//! records never appear in listings or content lookups.

mod error;
mod sqlite;
mod store;
mod types;

pub use error::MediaStoreError;
pub use sqlite::SqliteMediaStore;
pub use store::MediaStore;
pub use types::{MediaRecord, NewRecord, RecordHandle};
