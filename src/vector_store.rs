//! Vector store abstraction and SQLite implementation.
//!
//! The [`VectorStore`] trait covers the three operations the sync engine and
//! the retrieval stage need: upsert-by-id, delete-by-id, and similarity
//! search. The shipped backend keeps `(id, vector, text, metadata)` rows in
//! SQLite with embeddings as little-endian f32 BLOBs and computes cosine
//! similarity in-process.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::Chunk;

/// A stored chunk plus its embedding, as written by the sync engine.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Chunk key; equals the corresponding ledger record key.
    pub id: String,
    pub content: String,
    pub source: String,
    pub page: i64,
    pub embedding: Vec<f32>,
}

impl Entry {
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.key.clone(),
            content: chunk.content.clone(),
            source: chunk.source.clone(),
            page: chunk.page,
            embedding,
        }
    }
}

/// A similarity-search hit.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    pub content: String,
    pub source: String,
    pub page: i64,
    pub score: f32,
}

/// Persistent store of embedded chunks, addressed by chunk key.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace entries by id.
    async fn upsert(&self, entries: &[Entry]) -> Result<()>;

    /// Delete entries by id. Ids with no entry are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Return the `k` entries nearest to `query_vec` by cosine similarity,
    /// best first.
    async fn similarity_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// All entry ids in the collection, sorted.
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Number of entries in the collection.
    async fn count(&self) -> Result<u64>;
}

/// SQLite-backed vector store, scoped to one collection.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
        }
    }

    /// Create the entries table. Idempotent.
    pub async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO entries (collection, id, content, source, page, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    source = excluded.source,
                    page = excluded.page,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&entry.id)
            .bind(&entry.content)
            .bind(&entry.source)
            .bind(entry.page)
            .bind(vec_to_blob(&entry.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for slice in ids.chunks(500) {
            let placeholders = vec!["?"; slice.len()].join(", ");
            let sql = format!(
                "DELETE FROM entries WHERE collection = ? AND id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql).bind(&self.collection);
            for id in slice {
                query = query.bind(id);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let rows = sqlx::query(
            "SELECT id, content, source, page, embedding FROM entries WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredEntry> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredEntry {
                    id: row.get("id"),
                    content: row.get("content"),
                    source: row.get("source"),
                    page: row.get("page"),
                    score: cosine_similarity(query_vec, &vec),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM entries WHERE collection = ? ORDER BY id")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
