//! SQLite catalog store: schema, record upserts and lifecycle.

use crate::core::media::{normalize_path, MediaId, MediaRecord, MediaStatus, MediaType};
use crate::error::StoreError;
use crate::events::{CatalogEvent, Event, EventSender};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS media (
        id INTEGER PRIMARY KEY,
        file_path TEXT NOT NULL UNIQUE,
        root_dir TEXT NOT NULL,
        file_name TEXT NOT NULL,
        sha256 TEXT,
        p_hash TEXT,
        width INTEGER,
        height INTEGER,
        size_bytes INTEGER,
        captured_time_utc INTEGER,
        modified_time_utc INTEGER,
        media_type TEXT NOT NULL,
        thumbnail_path TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        error TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_media_sha256 ON media(sha256);
    CREATE INDEX IF NOT EXISTS idx_media_phash ON media(p_hash);
    CREATE INDEX IF NOT EXISTS idx_media_file_path ON media(file_path);
    CREATE INDEX IF NOT EXISTS idx_media_modified ON media(modified_time_utc);
    CREATE INDEX IF NOT EXISTS idx_media_root_dir ON media(root_dir);

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS media_tags (
        media_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        PRIMARY KEY (media_id, tag_id),
        FOREIGN KEY (media_id) REFERENCES media(id) ON DELETE CASCADE,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_media_tags_media_id ON media_tags(media_id);
    CREATE INDEX IF NOT EXISTS idx_media_tags_tag_id ON media_tags(tag_id);
";

/// Column list matching [`record_from_row`]
pub(super) const MEDIA_COLUMNS: &str = "id, file_path, root_dir, file_name, sha256, p_hash, \
     width, height, size_bytes, captured_time_utc, modified_time_utc, media_type, \
     thumbnail_path, status, error";

/// What the scanner needs to know about a previously cataloged file
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub size_bytes: Option<u64>,
    pub modified_time_utc: Option<i64>,
    pub thumbnail_path: Option<PathBuf>,
    pub content_hash: String,
    pub media_type: MediaType,
}

/// Active records under one root, keyed by file path
pub type ScanSnapshot = HashMap<PathBuf, SnapshotEntry>;

/// SQLite-backed media catalog
///
/// Uses WAL (Write-Ahead Logging) mode so readers proceed while the
/// scanner writes.
pub struct CatalogStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    events: Option<EventSender>,
}

impl CatalogStore {
    /// Open or create a catalog database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let open_err = |reason: String| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| open_err(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| open_err(e.to_string()))?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory catalog
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        conn.execute_batch(SCHEMA)?;
        debug!("Catalog opened at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            events: None,
        })
    }

    /// Send change notifications to `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub(super) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned {
            path: self.db_path.clone(),
        })
    }

    pub(super) fn notify(&self, event: CatalogEvent) {
        if let Some(events) = &self.events {
            events.send(Event::Catalog(event));
        }
    }

    /// Insert or update the record keyed by `file_path`.
    ///
    /// On conflict every derived field is replaced and `status` is forced
    /// back to active, reviving a soft-deleted row under its existing id.
    pub fn upsert(&self, record: &MediaRecord) -> Result<MediaId, StoreError> {
        let conn = self.lock()?;
        let file_path = path_to_sql(&record.file_path);

        conn.execute(
            "INSERT INTO media (
                file_path, root_dir, file_name, sha256, p_hash, width, height,
                size_bytes, captured_time_utc, modified_time_utc, media_type,
                thumbnail_path, status, error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'active', ?13)
            ON CONFLICT(file_path) DO UPDATE SET
                root_dir=excluded.root_dir,
                file_name=excluded.file_name,
                sha256=excluded.sha256,
                p_hash=excluded.p_hash,
                width=excluded.width,
                height=excluded.height,
                size_bytes=excluded.size_bytes,
                captured_time_utc=excluded.captured_time_utc,
                modified_time_utc=excluded.modified_time_utc,
                media_type=excluded.media_type,
                thumbnail_path=excluded.thumbnail_path,
                status='active',
                error=excluded.error",
            params![
                file_path,
                path_to_sql(&normalize_path(&record.root_dir)),
                record.file_name,
                non_empty(&record.content_hash),
                non_empty(&record.perceptual_hash),
                record.width,
                record.height,
                record.size_bytes.map(|s| s as i64),
                record.captured_time_utc,
                record.modified_time_utc,
                record.media_type.as_str(),
                record.thumbnail_path.as_deref().map(path_to_sql),
                record.error,
            ],
        )?;

        let id: MediaId = conn.query_row(
            "SELECT id FROM media WHERE file_path = ?1",
            [&file_path],
            |row| row.get(0),
        )?;
        drop(conn);

        self.notify(CatalogEvent::Changed);
        Ok(id)
    }

    /// Fetch a record by id, whatever its status
    pub fn get_by_id(&self, id: MediaId) -> Result<Option<MediaRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS);
        Ok(conn.query_row(&sql, [id], record_from_row).optional()?)
    }

    /// Fetch a record by path, whatever its status
    pub fn get_by_path(&self, path: &Path) -> Result<Option<MediaRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM media WHERE file_path = ?1", MEDIA_COLUMNS);
        Ok(conn
            .query_row(&sql, [path_to_sql(path)], record_from_row)
            .optional()?)
    }

    /// Mark one record deleted. Returns whether an active record changed.
    pub fn soft_delete(&self, path: &Path) -> Result<bool, StoreError> {
        let affected = self.lock()?.execute(
            "UPDATE media SET status='deleted' WHERE file_path = ?1 AND status='active'",
            [path_to_sql(path)],
        )?;

        if affected > 0 {
            self.notify(CatalogEvent::Changed);
        }
        Ok(affected > 0)
    }

    /// Point a record at a new thumbnail (`None` clears it)
    pub fn update_thumbnail_path(
        &self,
        path: &Path,
        thumbnail: Option<&Path>,
    ) -> Result<bool, StoreError> {
        let affected = self.lock()?.execute(
            "UPDATE media SET thumbnail_path = ?1 WHERE file_path = ?2",
            params![thumbnail.map(path_to_sql), path_to_sql(path)],
        )?;

        if affected > 0 {
            self.notify(CatalogEvent::Changed);
        }
        Ok(affected > 0)
    }

    /// Soft-delete every active record under `root` whose path is not in
    /// `existing`, in one transaction. Returns the number of records marked.
    pub fn mark_missing(&self, existing: &[PathBuf], root: &Path) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS scan_seen (path TEXT PRIMARY KEY);
             DELETE FROM scan_seen;",
        )?;
        {
            let mut insert = tx.prepare("INSERT OR IGNORE INTO scan_seen (path) VALUES (?1)")?;
            for path in existing {
                insert.execute([path_to_sql(path)])?;
            }
        }
        let affected = tx.execute(
            "UPDATE media SET status='deleted'
             WHERE root_dir = ?1 AND status='active'
             AND file_path NOT IN (SELECT path FROM scan_seen)",
            [path_to_sql(&normalize_path(root))],
        )?;
        tx.execute("DELETE FROM scan_seen", [])?;
        tx.commit()?;
        drop(conn);

        if affected > 0 {
            debug!("Marked {} missing files deleted under {}", affected, root.display());
            self.notify(CatalogEvent::Changed);
        }
        Ok(affected)
    }

    /// Active records under `root`, for incremental scan decisions
    pub fn snapshot_for_root(&self, root: &Path) -> Result<ScanSnapshot, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT file_path, size_bytes, modified_time_utc, thumbnail_path, sha256, media_type
             FROM media WHERE root_dir = ?1 AND status = 'active'",
        )?;

        let rows = stmt.query_map([path_to_sql(&normalize_path(root))], |row| {
            let path: String = row.get(0)?;
            Ok((
                PathBuf::from(path),
                SnapshotEntry {
                    size_bytes: row.get::<_, Option<i64>>(1)?.map(|s| s as u64),
                    modified_time_utc: row.get(2)?,
                    thumbnail_path: optional_path(row.get(3)?),
                    content_hash: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    media_type: MediaType::parse(&row.get::<_, String>(5)?),
                },
            ))
        })?;

        let mut snapshot = ScanSnapshot::new();
        for row in rows {
            match row {
                Ok((path, entry)) => {
                    snapshot.insert(path, entry);
                }
                Err(e) => warn!("Skipping unreadable catalog row: {}", e),
            }
        }
        Ok(snapshot)
    }

    /// Number of active records, optionally under one root
    pub fn active_count(&self, root: Option<&Path>) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = match root {
            Some(root) => conn.query_row(
                "SELECT COUNT(*) FROM media WHERE status='active' AND root_dir = ?1",
                [path_to_sql(&normalize_path(root))],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM media WHERE status='active'",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

pub(super) fn path_to_sql(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn optional_path(value: Option<String>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Map a row selected with [`MEDIA_COLUMNS`]
pub(super) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    Ok(MediaRecord {
        id: row.get(0)?,
        file_path: PathBuf::from(row.get::<_, String>(1)?),
        root_dir: PathBuf::from(row.get::<_, String>(2)?),
        file_name: row.get(3)?,
        content_hash: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        perceptual_hash: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        width: row.get(6)?,
        height: row.get(7)?,
        size_bytes: row.get::<_, Option<i64>>(8)?.map(|s| s as u64),
        captured_time_utc: row.get(9)?,
        modified_time_utc: row.get(10)?,
        media_type: MediaType::parse(&row.get::<_, String>(11)?),
        thumbnail_path: optional_path(row.get(12)?),
        status: MediaStatus::parse(&row.get::<_, String>(13)?),
        error: row.get::<_, Option<String>>(14)?.filter(|e| !e.is_empty()),
    })
}
