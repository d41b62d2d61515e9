//! `SQLite` database connection management.
//!
//! One connection behind a `parking_lot::Mutex`, shared by the file store
//! and the chunk sink. The storage collaborator is the only place that
//! serializes writes to the same key; the pipeline adds no locking of its own.

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;

use crate::error::StorageError;
use crate::Result;

/// Database connection wrapper.
///
/// Clone is cheap - it just clones the Arc.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl Database {
    /// Open a database at the given path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StorageError::Database(format!("failed to open database: {e}")))?;

        Self::from_connection(conn, path.to_string_lossy().to_string())
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StorageError::Database(format!("failed to open in-memory database: {e}"))
        })?;

        Self::from_connection(conn, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, path: String) -> Result<Self> {
        // Per-file commits keep transactions short; WAL lets readers run alongside.
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )
        .map_err(|e| StorageError::Database(format!("failed to configure database: {e}")))?;

        tracing::debug!(path = %path, "Database configured");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Execute a function with exclusive database access.
    ///
    /// # Errors
    ///
    /// Returns an error if the function fails.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a function inside an immediate transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails or if the function fails.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| StorageError::Database(format!("failed to begin transaction: {e}")))?;

        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| StorageError::Database(format!("failed to commit: {e}")))?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Get the database path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if the database answers queries.
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails.
    pub fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| StorageError::Database(format!("health check failed: {e}")).into())
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
