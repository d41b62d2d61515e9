//! File record storage for incremental indexing.

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{FileRecord, FileUpdate, IndexStats, StoredFile};
use super::{Database, FileStore};
use crate::error::StorageError;
use crate::Result;

/// Get the lookup view of a file record by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_file_by_path(conn: &Connection, path: &str) -> Result<Option<StoredFile>> {
    conn.query_row(
        "SELECT id, hash FROM files WHERE path = ?",
        [path],
        |row| {
            Ok(StoredFile {
                id: row.get(0)?,
                hash: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Insert a new file record and return its id.
///
/// # Errors
///
/// Returns an error if the insert fails, including a duplicate path.
pub fn insert_file(conn: &Connection, record: &FileRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO files (path, hash, mtime, size, lang, indexed_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            record.path,
            record.hash,
            record.mtime,
            record.size,
            record.lang,
            record.indexed_at
        ],
    )
    .map_err(|e| StorageError::Database(format!("failed to insert file: {e}")))?;

    let id = conn.last_insert_rowid();
    tracing::trace!(id, path = %record.path, "Inserted file record");
    Ok(id)
}

/// Rewrite hash, mtime, size and `indexed_at` of an existing record.
///
/// # Errors
///
/// Returns an error if the update fails or no record has the given id.
pub fn update_file(conn: &Connection, id: i64, fields: &FileUpdate) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE files SET hash = ?, mtime = ?, size = ?, indexed_at = ? WHERE id = ?",
            params![
                fields.hash,
                fields.mtime,
                fields.size,
                fields.indexed_at,
                id
            ],
        )
        .map_err(|e| StorageError::Database(format!("failed to update file: {e}")))?;

    if changed == 0 {
        return Err(StorageError::not_found("file", id.to_string()).into());
    }
    Ok(())
}

/// Count file records.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_files(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Collect file/chunk totals and the ten most common languages.
///
/// # Errors
///
/// Returns an error if any query fails.
pub fn index_stats(conn: &Connection) -> Result<IndexStats> {
    let files = count_files(conn)?;
    let chunks = super::chunks::count_chunks(conn)?;

    let mut stmt = conn
        .prepare(
            "SELECT lang, COUNT(*) AS n FROM files WHERE lang IS NOT NULL
             GROUP BY lang ORDER BY n DESC, lang ASC LIMIT 10",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let languages = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(IndexStats {
        files,
        chunks,
        languages,
    })
}

/// Remove every chunk and file record.
///
/// # Errors
///
/// Returns an error if the deletes fail.
pub fn clear_index(conn: &Connection) -> Result<()> {
    conn.execute_batch("DELETE FROM chunks; DELETE FROM files;")
        .map_err(|e| StorageError::Database(format!("failed to clear index: {e}")))?;
    tracing::info!("Index cleared");
    Ok(())
}

impl FileStore for Database {
    fn query_one(&self, path: &str) -> Result<Option<StoredFile>> {
        self.with_conn(|conn| get_file_by_path(conn, path))
    }

    fn insert(&self, record: &FileRecord) -> Result<i64> {
        self.with_conn(|conn| insert_file(conn, record))
    }

    fn update(&self, id: i64, fields: &FileUpdate) -> Result<()> {
        self.with_conn(|conn| update_file(conn, id, fields))
    }
}
