//! Chunk document storage backing the FTS5 search table.

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::Database;
use crate::error::{SinkError, StorageError};
use crate::indexer::Chunk;
use crate::sink::{ChunkDocument, SearchSink};
use crate::Result;

fn line_to_sql(line: usize) -> i64 {
    i64::try_from(line).unwrap_or(i64::MAX)
}

fn line_from_sql(line: i64) -> usize {
    usize::try_from(line).unwrap_or_default()
}

/// Insert or overwrite chunk documents by id.
///
/// Uses `ON CONFLICT DO UPDATE` so the FTS update trigger fires.
///
/// # Errors
///
/// Returns an error if any write fails.
pub fn upsert_chunks(conn: &Connection, documents: &[ChunkDocument]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO chunks (id, file_id, path, start_line, end_line, content, symbol, kind, lang, indexed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                symbol = excluded.symbol,
                kind = excluded.kind,
                lang = excluded.lang,
                path = excluded.path,
                indexed_at = excluded.indexed_at",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    for doc in documents {
        stmt.execute(params![
            doc.id,
            doc.file_id,
            doc.path,
            line_to_sql(doc.chunk.start_line),
            line_to_sql(doc.chunk.end_line),
            doc.chunk.content,
            doc.chunk.symbol,
            doc.chunk.kind,
            doc.lang,
            doc.indexed_at,
        ])
        .map_err(|e| StorageError::Database(format!("failed to upsert chunk {}: {e}", doc.id)))?;
    }

    tracing::trace!(count = documents.len(), "Upserted chunk documents");
    Ok(documents.len())
}

/// Delete every chunk of a file.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_chunks_for_file(conn: &Connection, file_id: i64) -> Result<usize> {
    conn.execute("DELETE FROM chunks WHERE file_id = ?", [file_id])
        .map_err(|e| StorageError::Database(format!("failed to delete chunks: {e}")).into())
}

/// Get the chunks of a file ordered by start line.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_chunks_for_file(conn: &Connection, file_id: i64) -> Result<Vec<Chunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT start_line, end_line, content, symbol, kind FROM chunks
             WHERE file_id = ? ORDER BY start_line",
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let chunks = stmt
        .query_map([file_id], |row| {
            Ok(Chunk {
                start_line: line_from_sql(row.get(0)?),
                end_line: line_from_sql(row.get(1)?),
                content: row.get(2)?,
                symbol: row.get(3)?,
                kind: row.get(4)?,
            })
        })
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(chunks)
}

/// Count all chunks.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_chunks(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Search sink writing into the local `chunks` table.
#[derive(Debug, Clone)]
pub struct SqliteChunkSink {
    db: Database,
}

impl SqliteChunkSink {
    /// Create a sink over an initialized database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SearchSink for SqliteChunkSink {
    async fn index_chunks(&self, documents: Vec<ChunkDocument>) -> Result<()> {
        let count = documents.len();
        self.db
            .with_transaction(|conn| upsert_chunks(conn, &documents))
            .map_err(|e| SinkError::SubmitFailed {
                documents: count,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete_file_chunks(&self, file_id: i64) -> Result<()> {
        self.db
            .with_conn(|conn| delete_chunks_for_file(conn, file_id))
            .map_err(|e| SinkError::PurgeFailed {
                file_id,
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_storage, FileRecord, FileStore};

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        let file_id = db.insert(&FileRecord::new("src/lib.rs", "h", 0, 0)).unwrap();
        (db, file_id)
    }

    fn doc(file_id: i64, start: usize, end: usize, content: &str) -> ChunkDocument {
        let chunk = Chunk {
            start_line: start,
            end_line: end,
            content: content.to_string(),
            symbol: Some("run".to_string()),
            kind: Some("function".to_string()),
        };
        ChunkDocument::new(file_id, "src/lib.rs", Some("rust".to_string()), chunk, 0)
    }

    #[tokio::test]
    async fn test_resubmission_overwrites() {
        let (db, file_id) = setup();
        let sink = SqliteChunkSink::new(db.clone());

        sink.index_chunks(vec![doc(file_id, 1, 2, "old body")])
            .await
            .unwrap();
        sink.index_chunks(vec![doc(file_id, 1, 2, "new body")])
            .await
            .unwrap();

        let chunks = db.with_conn(|c| get_chunks_for_file(c, file_id)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "new body");
        assert_eq!(chunks[0].symbol.as_deref(), Some("run"));
    }

    #[tokio::test]
    async fn test_delete_file_chunks() {
        let (db, file_id) = setup();
        let sink = SqliteChunkSink::new(db.clone());

        sink.index_chunks(vec![doc(file_id, 1, 2, "a"), doc(file_id, 3, 4, "b")])
            .await
            .unwrap();
        assert_eq!(db.with_conn(count_chunks).unwrap(), 2);

        sink.delete_file_chunks(file_id).await.unwrap();
        assert_eq!(db.with_conn(count_chunks).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_file_is_rejected() {
        let (db, _) = setup();
        let sink = SqliteChunkSink::new(db);

        let err = sink.index_chunks(vec![doc(404, 1, 1, "x")]).await.unwrap_err();
        assert!(matches!(err, crate::Error::Sink(SinkError::SubmitFailed { documents: 1, .. })));
    }
}
