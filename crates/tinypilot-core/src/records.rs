//! Shaping source items into [`DocumentRecord`]s.
//!
//! Each origin has its own variant of [`SourceDocument`] carrying only the
//! fields it needs; [`SourceDocument::into_record`] collapses them to the
//! common stored shape with namespaced ids and typed metadata.

use crate::models::{DocType, DocumentRecord, RecordMetadata};

/// Fixed `source` label for bounty rows.
pub const BOUNTY_SOURCE: &str = "bounties";

/// A source file from the project repository.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeDocument {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    pub content: String,
}

/// One row of the bounty spreadsheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BountyDocument {
    /// 0-based data row index.
    pub row: usize,
    pub description: String,
    pub bounty_type: Option<String>,
    /// Raw value cell; normalized to `"$<amount>"` when shaped.
    pub value: Option<String>,
    pub owner: Option<String>,
    pub link: Option<String>,
}

/// One scraped tutorial page.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorialDocument {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceDocument {
    Code(CodeDocument),
    Bounty(BountyDocument),
    Tutorial(TutorialDocument),
}

impl SourceDocument {
    pub fn doc_type(&self) -> DocType {
        match self {
            SourceDocument::Code(_) => DocType::Code,
            SourceDocument::Bounty(_) => DocType::Bounty,
            SourceDocument::Tutorial(_) => DocType::Tutorial,
        }
    }

    /// Namespaced record id: `repo_<path>`, `bounty_<row>`, `tutorial_<filename>`.
    pub fn record_id(&self) -> String {
        let prefix = self.doc_type().id_prefix();
        match self {
            SourceDocument::Code(c) => format!("{}_{}", prefix, c.path),
            SourceDocument::Bounty(b) => format!("{}_{}", prefix, b.row),
            SourceDocument::Tutorial(t) => format!("{}_{}", prefix, t.filename),
        }
    }

    pub fn into_record(self) -> DocumentRecord {
        let id = self.record_id();
        let doc_type = self.doc_type();
        match self {
            SourceDocument::Code(c) => DocumentRecord {
                id,
                document: c.content,
                metadata: RecordMetadata {
                    source: c.path,
                    doc_type,
                    bounty_type: None,
                    value: None,
                },
            },
            SourceDocument::Bounty(b) => {
                let value = b.value.as_deref().and_then(normalize_value);
                let bounty_type = b.bounty_type.as_deref().and_then(non_empty);
                DocumentRecord {
                    id,
                    document: format_bounty(&b, bounty_type.as_deref(), value.as_deref()),
                    metadata: RecordMetadata {
                        source: BOUNTY_SOURCE.to_string(),
                        doc_type,
                        bounty_type,
                        value,
                    },
                }
            }
            SourceDocument::Tutorial(t) => DocumentRecord {
                id,
                document: t.content,
                metadata: RecordMetadata {
                    source: t.filename,
                    doc_type,
                    bounty_type: None,
                    value: None,
                },
            },
        }
    }
}

/// Render a bounty row as the text that gets embedded.
///
/// Missing or blank fields are left out rather than rendered empty.
fn format_bounty(b: &BountyDocument, bounty_type: Option<&str>, value: Option<&str>) -> String {
    let mut lines = vec![format!("Bounty: {}", b.description.trim())];
    if let Some(t) = bounty_type {
        lines.push(format!("Type: {}", t));
    }
    if let Some(v) = value {
        lines.push(format!("Value: {}", v));
    }
    if let Some(owner) = b.owner.as_deref().and_then(non_empty) {
        lines.push(format!("GitHub Owner: {}", owner));
    }
    if let Some(link) = b.link.as_deref().and_then(non_empty) {
        lines.push(format!("Link: {}", link));
    }
    lines.join("\n")
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Normalize a spreadsheet value cell to currency format.
///
/// Numeric amounts become `"$<digits>"` with thousands separators dropped
/// (`"500"`, `"$500"`, `"$ 1,000"` → `"$500"`, `"$500"`, `"$1000"`). Anything
/// else (`"TBD"`, `"$300 + hardware"`) is kept verbatim, trimmed.
pub fn normalize_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let amount = trimmed.trim_start_matches('$').trim();
    let digits: String = amount.chars().filter(|c| *c != ',').collect();
    let numeric = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().next().is_some_and(|c| c.is_ascii_digit());
    if numeric {
        Some(format!("${}", digits))
    } else {
        Some(trimmed.to_string())
    }
}
