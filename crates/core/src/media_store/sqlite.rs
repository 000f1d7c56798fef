//! SQLite-backed media index implementation.

use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{MediaRecord, MediaStore, MediaStoreError, NewRecord, RecordHandle};
use crate::source::{ContentIndex, ResolutionError};

/// Authority under which the index answers `content://` lookups.
pub const DEFAULT_AUTHORITY: &str = "media";

const SELECT_COLUMNS: &str = "SELECT id, display_name, mime_type, relative_path, data_path, is_pending, size_bytes, created_at, updated_at FROM media_records";

/// SQLite-backed media index. Data files live below `root`.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
    root: PathBuf,
    authority: String,
}

impl SqliteMediaStore {
    /// Opens (or creates) the index database at `path`, storing data files under `root`.
    pub fn new(path: &Path, root: impl Into<PathBuf>) -> Result<Self, MediaStoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn, root.into())
    }

    /// Create an in-memory index (useful for testing). Data files still go to `root`.
    pub fn in_memory(root: impl Into<PathBuf>) -> Result<Self, MediaStoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, root.into())
    }

    fn from_connection(conn: Connection, root: PathBuf) -> Result<Self, MediaStoreError> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            root,
            authority: DEFAULT_AUTHORITY.to_string(),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), MediaStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                relative_path TEXT NOT NULL,
                data_path TEXT NOT NULL UNIQUE,
                is_pending INTEGER NOT NULL DEFAULT 1,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_records_pending ON media_records(is_pending);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, MediaStoreError> {
        self.conn
            .lock()
            .map_err(|_| MediaStoreError::Database("connection lock poisoned".to_string()))
    }

    fn validate_name(name: &str) -> Result<(), MediaStoreError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(MediaStoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn validate_folder(folder: &str) -> Result<(), MediaStoreError> {
        let path = Path::new(folder);
        if path.has_root() || path.components().any(|c| c == Component::ParentDir) {
            return Err(MediaStoreError::InvalidFolder(folder.to_string()));
        }
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MediaRecord> {
        let data_path: String = row.get(4)?;
        let is_pending: i64 = row.get(5)?;
        let size_bytes: i64 = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(MediaRecord {
            id: row.get(0)?,
            display_name: row.get(1)?,
            mime_type: row.get(2)?,
            relative_path: row.get(3)?,
            data_path: PathBuf::from(data_path),
            pending: is_pending != 0,
            size_bytes: size_bytes.max(0) as u64,
            created_at,
            updated_at,
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<MediaRecord>, MediaStoreError> {
        let record = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_COLUMNS),
                params![id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_where(&self, pending: bool) -> Result<Vec<MediaRecord>, MediaStoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE is_pending = ? ORDER BY id DESC",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![pending as i64], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl MediaStore for SqliteMediaStore {
    fn insert_pending_record(&self, request: &NewRecord) -> Result<MediaRecord, MediaStoreError> {
        Self::validate_name(&request.display_name)?;
        Self::validate_folder(&request.relative_path)?;

        let folder = self.root.join(&request.relative_path);
        let data_path = folder.join(&request.display_name);
        let data_path_str = data_path.to_string_lossy().to_string();

        let conn = self.lock()?;

        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM media_records WHERE data_path = ?)",
            params![data_path_str],
            |row| row.get(0),
        )?;
        if taken {
            return Err(MediaStoreError::Conflict { path: data_path });
        }

        fs::create_dir_all(&folder)?;
        // Reserve the data file so a concurrent writer cannot claim the same name.
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&data_path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    MediaStoreError::Conflict {
                        path: data_path.clone(),
                    }
                } else {
                    MediaStoreError::Io(e)
                }
            })?;

        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT INTO media_records (display_name, mime_type, relative_path, data_path, is_pending, size_bytes, created_at, updated_at) VALUES (?, ?, ?, ?, 1, 0, ?, ?)",
            params![
                request.display_name,
                request.mime_type,
                request.relative_path,
                data_path_str,
                now,
                now,
            ],
        );
        if let Err(e) = inserted {
            let _ = fs::remove_file(&data_path);
            return Err(e.into());
        }

        let id = conn.last_insert_rowid();
        debug!(id, path = %data_path.display(), "Inserted pending media record");

        Self::fetch(&conn, id)?.ok_or(MediaStoreError::NotFound(id))
    }

    fn open_writable(&self, handle: &RecordHandle) -> Result<File, MediaStoreError> {
        let record = {
            let conn = self.lock()?;
            Self::fetch(&conn, handle.id)?.ok_or(MediaStoreError::NotFound(handle.id))?
        };

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&record.data_path)?;
        Ok(file)
    }

    fn mark_visible(&self, handle: &RecordHandle) -> Result<MediaRecord, MediaStoreError> {
        let conn = self.lock()?;
        let record =
            Self::fetch(&conn, handle.id)?.ok_or(MediaStoreError::NotFound(handle.id))?;

        let size_bytes = fs::metadata(&record.data_path)?.len();
        conn.execute(
            "UPDATE media_records SET is_pending = 0, size_bytes = ?, updated_at = ? WHERE id = ?",
            params![size_bytes as i64, Utc::now().to_rfc3339(), handle.id],
        )?;

        debug!(id = handle.id, size_bytes, "Media record is now visible");

        Self::fetch(&conn, handle.id)?.ok_or(MediaStoreError::NotFound(handle.id))
    }

    fn delete_record(&self, handle: &RecordHandle) -> Result<bool, MediaStoreError> {
        let conn = self.lock()?;
        let Some(record) = Self::fetch(&conn, handle.id)? else {
            return Ok(false);
        };

        match fs::remove_file(&record.data_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(id = handle.id, path = %record.data_path.display(), "Data file already missing");
            }
            Err(e) => return Err(e.into()),
        }

        conn.execute("DELETE FROM media_records WHERE id = ?", params![handle.id])?;
        debug!(id = handle.id, "Deleted media record");
        Ok(true)
    }

    fn get(&self, handle: &RecordHandle) -> Result<Option<MediaRecord>, MediaStoreError> {
        let conn = self.lock()?;
        Self::fetch(&conn, handle.id)
    }

    fn list_visible(&self) -> Result<Vec<MediaRecord>, MediaStoreError> {
        self.list_where(false)
    }

    fn list_pending(&self) -> Result<Vec<MediaRecord>, MediaStoreError> {
        self.list_where(true)
    }
}

impl ContentIndex for SqliteMediaStore {
    fn authority(&self) -> &str {
        &self.authority
    }

    fn lookup(&self, id: &str) -> Result<Option<PathBuf>, ResolutionError> {
        let Ok(id) = id.parse::<i64>() else {
            return Ok(None);
        };
        let record = self
            .get(&RecordHandle { id })
            .map_err(|e| ResolutionError::Index(e.to_string()))?;
        Ok(record.filter(|r| !r.pending).map(|r| r.data_path))
    }
}
