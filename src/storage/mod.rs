//! `SQLite` storage for file records and chunk documents.
//!
//! This module provides:
//! - The [`FileStore`] collaborator interface used by the pipeline
//! - A `SQLite` implementation of it on [`Database`]
//! - [`SqliteChunkSink`], a search sink backed by an FTS5 table

mod chunks;
mod connection;
mod files;
mod models;
mod schema;

pub use chunks::{
    count_chunks, delete_chunks_for_file, get_chunks_for_file, upsert_chunks, SqliteChunkSink,
};
pub use connection::Database;
pub use files::{
    clear_index, count_files, get_file_by_path, index_stats, insert_file, update_file,
};
pub use models::{now_millis, FileRecord, FileUpdate, IndexStats, StoredFile};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};

/// Storage collaborator for file records, keyed by unique path.
///
/// Calls are blocking and safe to make from inside the pipeline.
pub trait FileStore: Send + Sync {
    /// Look up a record by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn query_one(&self, path: &str) -> crate::Result<Option<StoredFile>>;

    /// Insert a new record and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert(&self, record: &FileRecord) -> crate::Result<i64>;

    /// Rewrite the change-tracking fields of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn update(&self, id: i64, fields: &FileUpdate) -> crate::Result<()>;
}

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
