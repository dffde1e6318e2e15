//! Query-time retrieval and ranking.
//!
//! The retriever routes a query with [`classify`], runs one or two
//! type-filtered nearest-neighbor searches against a [`VectorStore`], turns
//! distances into scores, and returns a ranked list.
//!
//! # Bounty queries
//!
//! 1. One search restricted to `type = bounty`, pool of `bounty_pool`.
//! 2. If the query names a dollar amount (`"$500"`), keep only candidates
//!    whose `value` metadata is exactly that amount.
//! 3. Sort by score (desc) and truncate to `bounty_limit`.
//!
//! # General queries
//!
//! 1. Search `type = tutorial` with a pool of `tutorial_pool`.
//! 2. Search `type != tutorial` with a pool of `top_k`.
//! 3. Concatenate and sort by score (desc). No truncation.
//!
//! Tutorials get their own pool so a large code corpus cannot crowd them
//! out of a single top-k cut.
//!
//! All sorts are stable: equal scores keep retrieval order.

use anyhow::Result;

use crate::classify::{classify, dollar_amount, QueryKind};
use crate::embedding::{embed_one, Embedder};
use crate::models::{DocType, RetrievedDocument};
use crate::store::{QueryHit, TypeFilter, VectorStore};

/// Default number of code/bounty candidates on the general path.
pub const DEFAULT_TOP_K: usize = 5;

/// Candidate pool sizes and caps, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Bounty candidates requested before the exact value filter.
    pub bounty_pool: usize,
    /// Maximum bounty results returned.
    pub bounty_limit: usize,
    /// Tutorial candidates requested on the general path.
    pub tutorial_pool: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            bounty_pool: 100,
            bounty_limit: 20,
            tutorial_pool: 10,
        }
    }
}

/// Retrieves ranked documents for a free-text query.
pub struct Retriever<'a, S: VectorStore + ?Sized, E: Embedder + ?Sized> {
    store: &'a S,
    embedder: &'a E,
    params: RetrievalParams,
}

impl<'a, S: VectorStore + ?Sized, E: Embedder + ?Sized> Retriever<'a, S, E> {
    pub fn new(store: &'a S, embedder: &'a E, params: RetrievalParams) -> Self {
        Self {
            store,
            embedder,
            params,
        }
    }

    /// Retrieve documents for `query`, best first.
    ///
    /// Embedding or store errors propagate to the caller.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let query_vec = embed_one(self.embedder, query).await?;

        match classify(query) {
            QueryKind::Bounty => self.retrieve_bounties(query, &query_vec).await,
            QueryKind::General => self.retrieve_general(&query_vec, top_k).await,
        }
    }

    async fn retrieve_bounties(
        &self,
        query: &str,
        query_vec: &[f32],
    ) -> Result<Vec<RetrievedDocument>> {
        let hits = self
            .store
            .query(
                query_vec,
                self.params.bounty_pool,
                TypeFilter::Only(DocType::Bounty),
            )
            .await?;

        let target_value = dollar_amount(query);
        let mut docs: Vec<RetrievedDocument> = to_retrieved(hits)
            .into_iter()
            .filter(|d| match &target_value {
                Some(v) => d.metadata.value.as_deref() == Some(v.as_str()),
                None => true,
            })
            .collect();

        sort_by_score(&mut docs);
        docs.truncate(self.params.bounty_limit);
        Ok(docs)
    }

    async fn retrieve_general(
        &self,
        query_vec: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>> {
        let tutorial_hits = self
            .store
            .query(
                query_vec,
                self.params.tutorial_pool,
                TypeFilter::Only(DocType::Tutorial),
            )
            .await?;
        let other_hits = self
            .store
            .query(query_vec, top_k, TypeFilter::Except(DocType::Tutorial))
            .await?;

        let mut docs = to_retrieved(tutorial_hits);
        docs.extend(to_retrieved(other_hits));
        sort_by_score(&mut docs);
        Ok(docs)
    }
}

/// Convert store hits to scored documents, skipping null or empty documents.
pub fn to_retrieved(hits: Vec<QueryHit>) -> Vec<RetrievedDocument> {
    hits.into_iter()
        .filter_map(|hit| {
            let content = hit.document.filter(|d| !d.is_empty())?;
            Some(RetrievedDocument {
                id: hit.id,
                content,
                metadata: hit.metadata,
                score: 1.0 - hit.distance,
            })
        })
        .collect()
}

/// Stable sort by score, highest first. NaN scores compare as equal.
pub fn sort_by_score(docs: &mut [RetrievedDocument]) {
    docs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordMetadata;

    fn hit(id: &str, doc: Option<&str>, distance: f64) -> QueryHit {
        QueryHit {
            id: id.to_string(),
            document: doc.map(|d| d.to_string()),
            metadata: RecordMetadata {
                source: id.to_string(),
                doc_type: DocType::Code,
                bounty_type: None,
                value: None,
            },
            distance,
        }
    }

    #[test]
    fn test_to_retrieved_scores() {
        let docs = to_retrieved(vec![hit("a", Some("x"), 0.25), hit("b", Some("y"), 1.5)]);
        assert!((docs[0].score - 0.75).abs() < 1e-9);
        assert!((docs[1].score + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_to_retrieved_skips_null_and_empty() {
        let docs = to_retrieved(vec![
            hit("a", Some("x"), 0.1),
            hit("b", None, 0.2),
            hit("c", Some(""), 0.3),
            hit("d", Some("z"), 0.4),
        ]);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn test_sort_by_score_is_stable() {
        let mut docs = to_retrieved(vec![
            hit("first", Some("x"), 0.5),
            hit("best", Some("x"), 0.1),
            hit("second", Some("x"), 0.5),
        ]);
        sort_by_score(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "first", "second"]);
    }

    #[test]
    fn test_default_params() {
        let p = RetrievalParams::default();
        assert_eq!(p.bounty_pool, 100);
        assert_eq!(p.bounty_limit, 20);
        assert_eq!(p.tutorial_pool, 10);
    }
}
