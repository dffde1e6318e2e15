//! `tinypilot get <id>`: dump one stored record.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let store = SqliteStore::open(config, &config.embedding.model_or_default()).await?;
    let record = store.get(id).await?;
    store.pool().close().await;

    let Some(record) = record else {
        bail!("record not found: {}", id);
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
