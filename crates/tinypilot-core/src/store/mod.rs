//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the contract between the indexer, the
//! retriever, and whatever persists vectors: a named collection of
//! `(id, vector, document, metadata)` tuples with nearest-neighbor search
//! filtered by document type.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocType, DocumentRecord, RecordMetadata};

/// Metadata filter applied to a nearest-neighbor query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// No restriction.
    Any,
    /// Only records of this type.
    Only(DocType),
    /// Every record except this type.
    Except(DocType),
}

impl TypeFilter {
    pub fn matches(&self, doc_type: DocType) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Only(t) => doc_type == *t,
            TypeFilter::Except(t) => doc_type != *t,
        }
    }
}

/// One nearest-neighbor hit, ordered by ascending distance.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    /// Stored document text. `None` when the backend has a sparse placeholder.
    pub document: Option<String>,
    pub metadata: RecordMetadata,
    /// Backend distance; lower is more similar.
    pub distance: f64,
}

/// Abstract vector collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite records by id |
/// | [`query`](VectorStore::query) | Filtered nearest-neighbor search |
/// | [`count`](VectorStore::count) | Number of records in the collection |
/// | [`ids`](VectorStore::ids) | Ids of all records of one type |
/// | [`delete`](VectorStore::delete) | Remove records by id |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records. `embeddings[i]` belongs to `records[i]`.
    async fn upsert(&self, records: &[DocumentRecord], embeddings: &[Vec<f32>]) -> Result<()>;

    /// Return up to `n_results` hits matching `filter`, nearest first.
    ///
    /// An empty partition yields an empty list, not an error.
    async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: TypeFilter,
    ) -> Result<Vec<QueryHit>>;

    /// Total number of records in the collection.
    async fn count(&self) -> Result<usize>;

    /// Ids of every record of the given type.
    async fn ids(&self, doc_type: DocType) -> Result<Vec<String>>;

    /// Delete records by id. Unknown ids are ignored. Returns the number removed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;
}
