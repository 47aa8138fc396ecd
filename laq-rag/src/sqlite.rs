//! SQLite-backed persistent vector store.
//!
//! This module is only available when the `sqlite` feature is enabled.
//!
//! Embeddings are stored as little-endian `f32` blobs and metadata as a JSON
//! object. Search is a brute-force cosine scan over the collection, which is
//! adequate for the few thousand records of a personal document set.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, error};

use crate::error::{LaqError, Result};
use crate::record::{SearchHit, StoredRecord};
use crate::vectorstore::{VectorStore, check_dimensions, cosine_distance, nearest};

const BACKEND: &str = "sqlite";

/// File name of the database inside the configured directory.
pub const DATABASE_FILE: &str = "laq.sqlite3";

/// A [`VectorStore`] persisted in a single SQLite file.
///
/// Each [`insert`](VectorStore::insert) runs in one transaction; a duplicate
/// ID rolls back the whole batch.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) the store inside directory `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LaqError::StorageUnavailable`] if the directory cannot be
    /// created or the database cannot be opened.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            LaqError::storage(BACKEND, format!("cannot create {}: {e}", dir.display()))
        })?;
        Self::open(&dir.join(DATABASE_FILE))
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to open database");
            LaqError::storage(BACKEND, format!("cannot open {}: {e}", path.display()))
        })?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| LaqError::storage(BACKEND, e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                document TEXT NOT NULL,
                embedding BLOB NOT NULL,
                metadata TEXT NOT NULL,       -- JSON object of string values
                seq INTEGER NOT NULL,         -- insertion order, used to break distance ties
                PRIMARY KEY (collection, id),
                FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
            );
            ",
        )
        .map_err(|e| LaqError::storage(BACKEND, format!("migration failed: {e}")))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LaqError::storage(BACKEND, "connection lock poisoned"))
    }
}

/// Dimensions the collection was created with.
fn collection_dimensions(conn: &Connection, collection: &str) -> Result<usize> {
    let dimensions: Option<i64> = conn
        .query_row("SELECT dimensions FROM collections WHERE name = ?1", [collection], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| LaqError::storage(BACKEND, e))?;
    match dimensions {
        Some(d) => Ok(d as usize),
        None => Err(LaqError::storage(BACKEND, format!("collection '{collection}' does not exist"))),
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions) VALUES (?1, ?2)",
            params![name, dimensions as i64],
        )
        .map_err(|e| LaqError::storage(BACKEND, e))?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM collections WHERE name = ?1", [name])
            .map_err(|e| LaqError::storage(BACKEND, e))?;
        Ok(())
    }

    async fn insert(&self, collection: &str, records: &[StoredRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        let dimensions = collection_dimensions(&conn, collection)?;
        for record in records {
            check_dimensions(BACKEND, collection, dimensions, record.embedding.len())?;
        }

        let tx = conn.transaction().map_err(|e| LaqError::storage(BACKEND, e))?;
        {
            let next_seq: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq), -1) + 1 FROM records WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .map_err(|e| LaqError::storage(BACKEND, e))?;

            let mut stmt = tx
                .prepare(
                    "INSERT INTO records (collection, id, document, embedding, metadata, seq)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| LaqError::storage(BACKEND, e))?;

            for (offset, record) in records.iter().enumerate() {
                let metadata = serde_json::to_string(&record.metadata)
                    .map_err(|e| LaqError::storage(BACKEND, e))?;
                stmt.execute(params![
                    collection,
                    record.id,
                    record.document,
                    encode_embedding(&record.embedding),
                    metadata,
                    next_seq + offset as i64,
                ])
                .map_err(|e| {
                    if is_constraint_violation(&e) {
                        LaqError::DuplicateRecord {
                            collection: collection.to_string(),
                            id: record.id.clone(),
                        }
                    } else {
                        LaqError::storage(BACKEND, e)
                    }
                })?;
            }
        }
        // Dropping `tx` on the error paths above rolls the batch back.
        tx.commit().map_err(|e| LaqError::storage(BACKEND, e))?;

        debug!(collection, count = records.len(), "inserted records");
        Ok(())
    }

    async fn list_ids(&self, collection: &str) -> Result<HashSet<String>> {
        let conn = self.lock()?;
        collection_dimensions(&conn, collection)?;
        let mut stmt = conn
            .prepare("SELECT id FROM records WHERE collection = ?1")
            .map_err(|e| LaqError::storage(BACKEND, e))?;
        let ids = stmt
            .query_map([collection], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<std::result::Result<HashSet<_>, _>>())
            .map_err(|e| LaqError::storage(BACKEND, e))?;
        Ok(ids)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        collection_dimensions(&conn, collection)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records WHERE collection = ?1", [collection], |row| {
                row.get(0)
            })
            .map_err(|e| LaqError::storage(BACKEND, e))?;
        Ok(count as usize)
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.lock()?;
        let dimensions = collection_dimensions(&conn, collection)?;
        check_dimensions(BACKEND, collection, dimensions, embedding.len())?;
        let mut stmt = conn
            .prepare(
                "SELECT id, document, embedding, metadata FROM records
                 WHERE collection = ?1 ORDER BY seq",
            )
            .map_err(|e| LaqError::storage(BACKEND, e))?;

        let rows = stmt
            .query_map([collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| LaqError::storage(BACKEND, e))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, document, blob, metadata) = row.map_err(|e| LaqError::storage(BACKEND, e))?;
            let metadata: BTreeMap<String, String> =
                serde_json::from_str(&metadata).map_err(|e| {
                    LaqError::storage(BACKEND, format!("corrupt metadata for '{id}': {e}"))
                })?;
            let distance = cosine_distance(&decode_embedding(&blob), embedding);
            hits.push(SearchHit { id, document, metadata, distance });
        }

        Ok(nearest(hits, top_k))
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            document: format!("Q: {id}\nA: a"),
            embedding,
            metadata: BTreeMap::from([("laq_num".to_string(), id.to_string())]),
        }
    }

    #[test]
    fn embedding_blob_round_trips() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), v);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteVectorStore::open_dir(dir.path()).unwrap();
            store.create_collection("laqs", 2).await.unwrap();
            store.insert("laqs", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        }
        let store = SqliteVectorStore::open_dir(dir.path()).unwrap();
        assert_eq!(store.count("laqs").await.unwrap(), 1);
        let hits = store.query("laqs", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].metadata["laq_num"], "a");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn duplicate_rolls_back_batch() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("laqs", 2).await.unwrap();
        store.insert("laqs", &[record("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store
            .insert("laqs", &[record("b", vec![0.0, 1.0]), record("a", vec![1.0, 1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, LaqError::DuplicateRecord { ref id, .. } if id == "a"));
        assert_eq!(store.list_ids("laqs").await.unwrap(), HashSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn delete_collection_cascades() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("laqs", 2).await.unwrap();
        store.insert("laqs", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        store.delete_collection("laqs").await.unwrap();
        assert!(matches!(
            store.count("laqs").await.unwrap_err(),
            LaqError::StorageUnavailable { .. }
        ));
        store.create_collection("laqs", 2).await.unwrap();
        assert_eq!(store.count("laqs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dimensions_survive_reopen_and_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteVectorStore::open_dir(dir.path()).unwrap();
            store.create_collection("laqs", 2).await.unwrap();
            store.insert("laqs", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        }
        let store = SqliteVectorStore::open_dir(dir.path()).unwrap();
        store.create_collection("laqs", 3).await.unwrap();

        let err = store.insert("laqs", &[record("b", vec![1.0, 0.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, LaqError::StorageUnavailable { .. }));
        assert_eq!(store.count("laqs").await.unwrap(), 1);

        let err = store.query("laqs", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, LaqError::StorageUnavailable { ref message, .. } if message.contains("holds 2")));

        store.delete_collection("laqs").await.unwrap();
        store.create_collection("laqs", 3).await.unwrap();
        store.insert("laqs", &[record("b", vec![1.0, 0.0, 0.0])]).await.unwrap();
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.create_collection("laqs", 2).await.unwrap();
        store
            .insert("laqs", &[record("z", vec![1.0, 0.0]), record("a", vec![2.0, 0.0])])
            .await
            .unwrap();
        let hits = store.query("laqs", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
