//! Core data models shared by the indexer, retriever, and generator.
//!
//! A [`DocumentRecord`] is the unit written to a [`VectorStore`](crate::store::VectorStore);
//! a [`RetrievedDocument`] is the unit the retriever hands to the generator.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// The category of an indexed document. Every record has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Code,
    Bounty,
    Tutorial,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Code => "code",
            DocType::Bounty => "bounty",
            DocType::Tutorial => "tutorial",
        }
    }

    /// Prefix used to namespace record ids by origin.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            DocType::Code => "repo",
            DocType::Bounty => "bounty",
            DocType::Tutorial => "tutorial",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(DocType::Code),
            "bounty" => Ok(DocType::Bounty),
            "tutorial" => Ok(DocType::Tutorial),
            other => bail!("Unknown document type: '{}'", other),
        }
    }
}

/// Metadata stored alongside every record.
///
/// Serialized as a flat JSON object: `{"source": ..., "type": ...}` plus
/// `bounty_type` / `value` for bounty rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Original filename or a fixed label (`"bounties"`).
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounty_type: Option<String>,
    /// Currency-formatted value, e.g. `"$500"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A shaped document ready for embedding and upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Namespaced id: `repo_<path>`, `bounty_<row>`, `tutorial_<file>`.
    pub id: String,
    /// The literal text that gets embedded and returned as context.
    pub document: String,
    pub metadata: RecordMetadata,
}

/// A ranked result flowing out of the retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    pub metadata: RecordMetadata,
    /// `1 - distance`; higher is more similar. Relative signal only.
    pub score: f64,
}

impl RetrievedDocument {
    pub fn doc_type(&self) -> DocType {
        self.metadata.doc_type
    }
}
