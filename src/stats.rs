//! `tinypilot stats`: what is indexed, per document type.

use anyhow::Result;
use tinypilot_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_stats(config: &Config) -> Result<()> {
    let model = config.embedding.model_or_default();
    let store = SqliteStore::open(config, &model).await?;

    let total = store.count().await?;
    let by_type = store.counts_by_type().await?;
    let foreign = store.foreign_models().await?;
    let turns: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcripts")
        .fetch_one(store.pool())
        .await?;
    store.pool().close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("tinypilot: index stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", store.collection());
    println!("  Model:       {}", model);
    println!();
    println!("  Records:     {}", total);
    for (doc_type, n) in &by_type {
        println!("    {:<10} {:>8}", doc_type, n);
    }
    println!("  Transcript:  {} turns", turns);
    if !foreign.is_empty() {
        println!();
        println!("  Other embedding models present: {}", foreign.join(", "));
    }
    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
