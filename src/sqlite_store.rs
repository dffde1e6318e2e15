//! SQLite-backed [`VectorStore`] implementation.
//!
//! Records live in the `records` table keyed by `(collection, id)`, with
//! the embedding stored as a little-endian f32 BLOB. Nearest-neighbor
//! search is brute-force cosine distance over the filtered partition, which
//! is plenty for a corpus of a few thousand files.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use tinypilot_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use tinypilot_core::models::{DocType, DocumentRecord, RecordMetadata};
use tinypilot_core::store::{QueryHit, TypeFilter, VectorStore};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`VectorStore`] trait for one collection.
pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    model: String,
}

/// A stored record as shown by `tinypilot get`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: String,
    pub doc_type: String,
    pub document: Option<String>,
    pub metadata: serde_json::Value,
    pub model: String,
    pub dims: i64,
    pub updated_at: i64,
}

impl SqliteStore {
    /// `model` is recorded with every upserted vector.
    pub fn new(pool: SqlitePool, collection: &str, model: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
            model: model.to_string(),
        }
    }

    /// Connect to the configured database, apply the schema, and bind to
    /// the configured collection.
    pub async fn open(config: &Config, model: &str) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool, &config.db.collection, model))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fetch one record by id.
    pub async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT id, doc_type, document, metadata_json, model, dims, updated_at FROM records WHERE collection = ? AND id = ?",
        )
        .bind(&self.collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let metadata_json: String = r.get("metadata_json");
            StoredRecord {
                id: r.get("id"),
                doc_type: r.get("doc_type"),
                document: r.get("document"),
                metadata: serde_json::from_str(&metadata_json)
                    .unwrap_or(serde_json::json!({})),
                model: r.get("model"),
                dims: r.get("dims"),
                updated_at: r.get("updated_at"),
            }
        }))
    }

    /// Record counts per document type, sorted by type name.
    pub async fn counts_by_type(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT doc_type, COUNT(*) AS n FROM records WHERE collection = ? GROUP BY doc_type ORDER BY doc_type",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| (r.get("doc_type"), r.get("n"))).collect())
    }

    /// Embedding models present in the collection other than the configured one.
    pub async fn foreign_models(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT model FROM records WHERE collection = ? AND model != ? ORDER BY model",
        )
        .bind(&self.collection)
        .bind(&self.model)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("model")).collect())
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, records: &[DocumentRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        if records.len() != embeddings.len() {
            bail!(
                "upsert got {} records but {} embeddings",
                records.len(),
                embeddings.len()
            );
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (record, vector) in records.iter().zip(embeddings.iter()) {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, doc_type, document, metadata_json,
                                     embedding, model, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    doc_type = excluded.doc_type,
                    document = excluded.document,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(record.metadata.doc_type.as_str())
            .bind(&record.document)
            .bind(&metadata_json)
            .bind(vec_to_blob(vector))
            .bind(&self.model)
            .bind(vector.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: TypeFilter,
    ) -> Result<Vec<QueryHit>> {
        let base = "SELECT id, document, metadata_json, embedding FROM records WHERE collection = ?";
        let (sql, type_bind) = match filter {
            TypeFilter::Any => (base.to_string(), None),
            TypeFilter::Only(t) => (format!("{} AND doc_type = ?", base), Some(t.as_str())),
            TypeFilter::Except(t) => (format!("{} AND doc_type != ?", base), Some(t.as_str())),
        };

        let mut q = sqlx::query(&sql).bind(&self.collection);
        if let Some(t) = type_bind {
            q = q.bind(t);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: RecordMetadata = match serde_json::from_str(&metadata_json) {
                Ok(m) => m,
                Err(e) => {
                    let id: String = row.get("id");
                    tracing::warn!(%id, error = %e, "skipping record with unreadable metadata");
                    continue;
                }
            };
            let blob: Vec<u8> = row.get("embedding");
            hits.push(QueryHit {
                id: row.get("id"),
                document: row.get("document"),
                metadata,
                distance: cosine_distance(embedding, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n_results);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn ids(&self, doc_type: DocType) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM records WHERE collection = ? AND doc_type = ? ORDER BY id",
        )
        .bind(&self.collection)
        .bind(doc_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0usize;
        for id in ids {
            let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
                .bind(&self.collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(tmp: &TempDir, collection: &str) -> SqliteStore {
        let pool = db::connect_path(&tmp.path().join("t.sqlite")).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        SqliteStore::new(pool, collection, "test-model")
    }

    fn record(id: &str, doc_type: DocType, text: &str, value: Option<&str>) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            document: text.to_string(),
            metadata: RecordMetadata {
                source: id.to_string(),
                doc_type,
                bounty_type: None,
                value: value.map(|v| v.to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp, "c").await;
        let recs = vec![
            record("bounty_0", DocType::Bounty, "a", Some("$100")),
            record("bounty_1", DocType::Bounty, "b", Some("$500")),
        ];
        let vecs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        store.upsert(&recs, &vecs).await.unwrap();
        store.upsert(&recs, &vecs).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_query_roundtrips_metadata_and_filters() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp, "c").await;
        store
            .upsert(
                &[
                    record("bounty_0", DocType::Bounty, "bounty text", Some("$500")),
                    record("tutorial_a.txt", DocType::Tutorial, "tutorial text", None),
                    record("repo_x.py", DocType::Code, "code text", None),
                ],
                &[vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let hits = store
            .query(&[1.0, 0.0], 10, TypeFilter::Only(DocType::Bounty))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.value.as_deref(), Some("$500"));
        assert!(hits[0].distance.abs() < 1e-6);

        let hits = store
            .query(&[1.0, 0.0], 10, TypeFilter::Except(DocType::Tutorial))
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["bounty_0", "repo_x.py"]);

        let hits = store.query(&[1.0, 0.0], 2, TypeFilter::Any).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let a = open(&tmp, "a").await;
        let b = SqliteStore::new(a.pool().clone(), "b", "test-model");
        a.upsert(&[record("repo_x", DocType::Code, "x", None)], &[vec![1.0]])
            .await
            .unwrap();
        assert_eq!(a.count().await.unwrap(), 1);
        assert_eq!(b.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_delete_get_counts() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp, "c").await;
        store
            .upsert(
                &[
                    record("tutorial_a.txt", DocType::Tutorial, "a", None),
                    record("tutorial_b.txt", DocType::Tutorial, "b", None),
                    record("repo_x.py", DocType::Code, "x", None),
                ],
                &[vec![1.0], vec![1.0], vec![1.0]],
            )
            .await
            .unwrap();

        assert_eq!(
            store.ids(DocType::Tutorial).await.unwrap(),
            vec!["tutorial_a.txt".to_string(), "tutorial_b.txt".to_string()]
        );
        assert_eq!(
            store.counts_by_type().await.unwrap(),
            vec![("code".to_string(), 1), ("tutorial".to_string(), 2)]
        );

        let got = store.get("repo_x.py").await.unwrap().unwrap();
        assert_eq!(got.doc_type, "code");
        assert_eq!(got.document.as_deref(), Some("x"));
        assert_eq!(got.metadata["type"], "code");
        assert_eq!(got.model, "test-model");

        let removed = store
            .delete(&["tutorial_b.txt".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("tutorial_b.txt").await.unwrap().is_none());
        assert!(store.foreign_models().await.unwrap().is_empty());
    }
}
