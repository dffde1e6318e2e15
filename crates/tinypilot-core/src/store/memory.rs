//! In-memory [`VectorStore`] implementation for tests and small corpora.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Queries are
//! brute-force cosine distance over every stored vector.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{DocType, DocumentRecord, RecordMetadata};

use super::{QueryHit, TypeFilter, VectorStore};

struct StoredRecord {
    document: Option<String>,
    metadata: RecordMetadata,
    vector: Vec<f32>,
}

/// In-memory vector collection.
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert a record whose document text is missing.
    ///
    /// Mirrors the sparse placeholders some vector services return at a rank.
    pub fn insert_placeholder(&self, id: &str, metadata: RecordMetadata, vector: Vec<f32>) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(
            id.to_string(),
            StoredRecord {
                document: None,
                metadata,
                vector,
            },
        );
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: &[DocumentRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        if records.len() != embeddings.len() {
            bail!(
                "upsert got {} records but {} embeddings",
                records.len(),
                embeddings.len()
            );
        }
        let mut stored = self.records.write().unwrap_or_else(|e| e.into_inner());
        for (record, vector) in records.iter().zip(embeddings.iter()) {
            stored.insert(
                record.id.clone(),
                StoredRecord {
                    document: Some(record.document.clone()),
                    metadata: record.metadata.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: TypeFilter,
    ) -> Result<Vec<QueryHit>> {
        let stored = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<QueryHit> = stored
            .iter()
            .filter(|(_, r)| filter.matches(r.metadata.doc_type))
            .map(|(id, r)| QueryHit {
                id: id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(embedding, &r.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n_results);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap_or_else(|e| e.into_inner()).len())
    }

    async fn ids(&self, doc_type: DocType) -> Result<Vec<String>> {
        let stored = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(stored
            .iter()
            .filter(|(_, r)| r.metadata.doc_type == doc_type)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut stored = self.records.write().unwrap_or_else(|e| e.into_inner());
        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }
}
