//! Database schema definitions and migrations.
//!
//! Provides versioned schema migrations for safe database upgrades.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current_version = get_current_version(conn)?;
    tracing::debug!(
        current = current_version,
        target = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_current_version(conn: &Connection) -> Result<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StorageError::Migration(format!("failed to get version: {e}")).into())
}

/// Record a migration as applied.
fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, super::models::now_millis()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;

    Ok(())
}

/// Migration v1: files, chunks and the full-text mirror.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: files, chunks, chunks_fts");

    conn.execute_batch(
        r"
        -- One record per indexed path
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            hash TEXT NOT NULL,
            mtime INTEGER,
            size INTEGER,
            lang TEXT,
            indexed_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
        CREATE INDEX IF NOT EXISTS idx_files_lang ON files(lang);

        -- Chunk documents keyed by '{file_id}:{start}-{end}'
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            path TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            content TEXT NOT NULL,
            symbol TEXT,
            kind TEXT,
            lang TEXT,
            indexed_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
            content,
            symbol,
            content='chunks',
            content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
            INSERT INTO chunks_fts(rowid, content, symbol)
            VALUES (new.rowid, new.content, new.symbol);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, content, symbol)
            VALUES ('delete', old.rowid, old.content, old.symbol);
        END;

        CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, content, symbol)
            VALUES ('delete', old.rowid, old.content, old.symbol);
            INSERT INTO chunks_fts(rowid, content, symbol)
            VALUES (new.rowid, new.content, new.symbol);
        END;
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)?;
    tracing::info!("Migration v1 complete");

    Ok(())
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if any expected table is missing from the schema.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in ["files", "chunks", "chunks_fts"] {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}
