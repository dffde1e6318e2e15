//! Append-only log of questions and answers.
//!
//! Every `ask` and every chat turn is recorded in the `transcripts` table.
//! Failed turns store the error message as the answer with `ok = false`.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub seq: i64,
    pub created_at: i64,
    pub query: String,
    pub answer: String,
    pub ok: bool,
}

impl TranscriptEntry {
    /// `created_at` as an RFC 3339 timestamp, or the raw number if out of range.
    pub fn timestamp(&self) -> String {
        match Utc.timestamp_opt(self.created_at, 0).single() {
            Some(dt) => dt.to_rfc3339(),
            None => self.created_at.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct TranscriptLog {
    pool: SqlitePool,
}

impl TranscriptLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, query: &str, answer: &str, ok: bool) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO transcripts (created_at, query, answer, ok) VALUES (?, ?, ?, ?)",
        )
        .bind(Utc::now().timestamp())
        .bind(query)
        .bind(answer)
        .bind(ok)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The last `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<TranscriptEntry>> {
        let rows = sqlx::query(
            "SELECT seq, created_at, query, answer, ok FROM transcripts ORDER BY seq DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries: Vec<TranscriptEntry> = rows
            .iter()
            .map(|row| TranscriptEntry {
                seq: row.get("seq"),
                created_at: row.get("created_at"),
                query: row.get("query"),
                answer: row.get("answer"),
                ok: row.get("ok"),
            })
            .collect();
        entries.reverse();
        Ok(entries)
    }
}

/// `tinypilot history`: print the last `limit` turns, oldest first.
pub async fn run_history(config: &Config, limit: usize) -> Result<()> {
    let store = SqliteStore::open(config, &config.embedding.model_or_default()).await?;
    let entries = TranscriptLog::new(store.pool().clone()).recent(limit).await?;
    store.pool().close().await;

    if entries.is_empty() {
        println!("No history.");
        return Ok(());
    }
    for e in &entries {
        let status = if e.ok { "" } else { " [failed]" };
        println!("#{} {}{}", e.seq, e.timestamp(), status);
        println!("  Q: {}", e.query);
        println!("  A: {}", e.answer.replace('\n', "\n     "));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_recent() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("t.sqlite")).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        let log = TranscriptLog::new(pool);

        log.append("first", "a1", true).await.unwrap();
        log.append("second", "boom", false).await.unwrap();
        log.append("third", "a3", true).await.unwrap();

        let last_two = log.recent(2).await.unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].query, "second");
        assert!(!last_two[0].ok);
        assert_eq!(last_two[1].query, "third");
        assert!(last_two[1].seq > last_two[0].seq);
    }

    #[test]
    fn test_timestamp_format() {
        let entry = TranscriptEntry {
            seq: 1,
            created_at: 0,
            query: String::new(),
            answer: String::new(),
            ok: true,
        };
        assert_eq!(entry.timestamp(), "1970-01-01T00:00:00+00:00");
    }
}
