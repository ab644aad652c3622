//! Vector store: named collections of embedded chunks
//!
//! The SQLite implementation keeps every chunk's embedding as a blob and
//! ranks a collection by cosine distance at query time.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::embeddings::{blob_to_embedding, cosine_distance, embedding_to_blob};
use crate::error::RetrievalError;

/// A stored chunk ranked against a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    /// Source document identifier, used for citations
    pub source: String,
    /// Cosine distance to the query (0 = identical direction)
    pub distance: f32,
}

/// A chunk to write at ingestion time
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `k` nearest chunks, ascending by distance.
    /// Fails with `MissingCollection` when the collection does not exist.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError>;

    /// Create the collection if needed, recording the embedding model
    async fn ensure_collection(&self, collection: &str, model: &str) -> Result<(), RetrievalError>;

    /// Insert or replace chunks by id
    async fn upsert(&self, collection: &str, chunks: Vec<NewChunk>) -> Result<(), RetrievalError>;

    /// Embedding model the collection was built with, if the collection exists
    async fn collection_model(&self, collection: &str) -> Result<Option<String>, RetrievalError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    embedding_model TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chunks (
    collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    id TEXT NOT NULL,
    text TEXT NOT NULL,
    source TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (collection, id)
);
";

/// SQLite-backed vector store; cheap to clone, shares one connection
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVectorStore {
    pub fn open(path: &Path) -> Result<Self, RetrievalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RetrievalError::Store(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an existing store without creating the file
    pub fn open_existing(path: &Path) -> Result<Self, RetrievalError> {
        if !path.exists() {
            return Err(RetrievalError::Store(format!(
                "knowledge store not found at {}",
                path.display()
            )));
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self, RetrievalError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RetrievalError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking SQLite work off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RetrievalError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RetrievalError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| RetrievalError::Store(format!("store task failed: {}", e)))?
    }
}

fn collection_exists(conn: &Connection, name: &str) -> Result<bool, RetrievalError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM collections WHERE name = ?1",
            [name],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let collection = collection.to_string();
        let query = embedding.to_vec();

        self.with_conn(move |conn| {
            if !collection_exists(conn, &collection)? {
                return Err(RetrievalError::MissingCollection(collection));
            }

            let mut stmt = conn.prepare(
                "SELECT id, text, source, embedding FROM chunks WHERE collection = ?1",
            )?;
            let rows = stmt.query_map([&collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?;

            let mut scored = Vec::new();
            for row in rows {
                let (id, text, source, blob) = row?;
                let Some(vector) = blob_to_embedding(&blob) else {
                    warn!(chunk = %id, "Skipping chunk with a corrupt embedding");
                    continue;
                };
                if vector.len() != query.len() {
                    return Err(RetrievalError::Store(format!(
                        "chunk '{}' in '{}' has {} dimensions, query has {}",
                        id,
                        collection,
                        vector.len(),
                        query.len()
                    )));
                }
                scored.push(ScoredChunk {
                    distance: cosine_distance(&query, &vector),
                    id,
                    text,
                    source,
                });
            }

            scored.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(k);
            debug!(collection = %collection, hits = scored.len(), "Vector query finished");
            Ok(scored)
        })
        .await
    }

    async fn ensure_collection(&self, collection: &str, model: &str) -> Result<(), RetrievalError> {
        let collection = collection.to_string();
        let model = model.to_string();

        self.with_conn(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT embedding_model FROM collections WHERE name = ?1",
                    [&collection],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(stored) if stored != model => Err(RetrievalError::Store(format!(
                    "collection '{}' was built with embedding model '{}', not '{}'",
                    collection, stored, model
                ))),
                Some(_) => Ok(()),
                None => {
                    conn.execute(
                        "INSERT INTO collections (name, embedding_model, created_at) VALUES (?1, ?2, ?3)",
                        params![collection, model, Utc::now().to_rfc3339()],
                    )?;
                    Ok(())
                }
            }
        })
        .await
    }

    async fn upsert(&self, collection: &str, chunks: Vec<NewChunk>) -> Result<(), RetrievalError> {
        let collection = collection.to_string();

        self.with_conn(move |conn| {
            if !collection_exists(conn, &collection)? {
                return Err(RetrievalError::MissingCollection(collection));
            }

            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO chunks (collection, id, text, source, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for chunk in &chunks {
                    stmt.execute(params![
                        collection,
                        chunk.id,
                        chunk.text,
                        chunk.source,
                        embedding_to_blob(&chunk.embedding)
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn collection_model(&self, collection: &str) -> Result<Option<String>, RetrievalError> {
        let collection = collection.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT embedding_model FROM collections WHERE name = ?1",
                    [&collection],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, source: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            id: id.to_string(),
            text: format!("text of {id}"),
            source: source.to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_query_ranks_by_distance() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.ensure_collection("kb", "bge").await.unwrap();
        store
            .upsert(
                "kb",
                vec![
                    chunk("far", "b.md", vec![0.0, 1.0]),
                    chunk("near", "a.md", vec![1.0, 0.1]),
                    chunk("opposite", "c.md", vec![-1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("kb", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert_eq!(hits[1].id, "far");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_query_with_other_dimension_fails() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.ensure_collection("kb", "bge").await.unwrap();
        store
            .upsert("kb", vec![chunk("a", "a.md", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = store.query("kb", &[1.0, 0.0, 0.0], 2).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Store(ref m) if m.contains("2 dimensions")));
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        let err = store.query("kb_collection", &[1.0], 2).await.unwrap_err();
        assert!(matches!(err, RetrievalError::MissingCollection(name) if name == "kb_collection"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.ensure_collection("kb", "bge").await.unwrap();
        store
            .upsert("kb", vec![chunk("0_chunk_0", "a.md", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("kb", vec![chunk("0_chunk_0", "a2.md", vec![1.0, 0.0])])
            .await
            .unwrap();

        let hits = store.query("kb", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "a2.md");
    }

    #[tokio::test]
    async fn test_collection_model_mismatch_rejected() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.ensure_collection("kb", "bge").await.unwrap();
        store.ensure_collection("kb", "bge").await.unwrap();
        assert!(store.ensure_collection("kb", "other").await.is_err());
        assert_eq!(
            store.collection_model("kb").await.unwrap().as_deref(),
            Some("bge")
        );
    }

    #[tokio::test]
    async fn test_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("knowledge.db");
        {
            let store = SqliteVectorStore::open(&path).unwrap();
            store.ensure_collection("kb", "bge").await.unwrap();
            store
                .upsert("kb", vec![chunk("x", "a.md", vec![0.5, 0.5])])
                .await
                .unwrap();
        }
        let reopened = SqliteVectorStore::open_existing(&path).unwrap();
        assert_eq!(reopened.query("kb", &[0.5, 0.5], 1).await.unwrap().len(), 1);
        assert!(SqliteVectorStore::open_existing(&dir.path().join("missing.db")).is_err());
    }
}
