//! `tinypilot search`: print the ranked retrieval for a query.
//!
//! Runs exactly the retrieval `ask` would run, without calling the LLM.
//! Useful for checking what context a question pulls in.

use anyhow::Result;

use tinypilot_core::models::RetrievedDocument;
use tinypilot_core::retriever::Retriever;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

const EXCERPT_CHARS: usize = 160;

pub async fn run_search(config: &Config, query: &str, top_k: usize) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteStore::open(config, embedder.model_name()).await?;
    warn_foreign_models(&store).await;

    let retriever = Retriever::new(&store, embedder.as_ref(), config.retrieval.params());
    let docs = retriever.retrieve(query, top_k).await?;

    print!("{}", render_results(&docs));

    store.pool().close().await;
    Ok(())
}

/// Log a warning when the collection holds vectors from another embedding model.
pub async fn warn_foreign_models(store: &SqliteStore) {
    match store.foreign_models().await {
        Ok(models) if !models.is_empty() => tracing::warn!(
            models = %models.join(", "),
            "collection contains vectors from other embedding models; re-index for consistent results"
        ),
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "could not check stored embedding models"),
    }
}

pub fn render_results(docs: &[RetrievedDocument]) -> String {
    if docs.is_empty() {
        return "No results.\n".to_string();
    }

    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{:.2}] {} / {}\n",
            i + 1,
            doc.score,
            doc.doc_type(),
            doc.metadata.source
        ));
        if let Some(ref t) = doc.metadata.bounty_type {
            out.push_str(&format!("    type: {}\n", t));
        }
        if let Some(ref v) = doc.metadata.value {
            out.push_str(&format!("    value: {}\n", v));
        }
        out.push_str(&format!("    excerpt: \"{}\"\n", excerpt(&doc.content)));
        out.push_str(&format!("    id: {}\n\n", doc.id));
    }
    out
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
