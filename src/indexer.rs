//! Populating the vector collection.
//!
//! Three sources feed one collection: source files from a local checkout of
//! the repository, rows of the bounty spreadsheet exported as CSV, and
//! scraped tutorial pages stored as `.txt` files. Every pass is an idempotent
//! upsert keyed by the namespaced record id, so re-running an index leaves
//! the record count unchanged.
//!
//! Records whose source disappeared are left in place unless the pass runs
//! with `prune`, in which case stored ids of that type that were not written
//! in this pass are deleted afterwards.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use tinypilot_core::embedding::Embedder;
use tinypilot_core::models::{DocType, DocumentRecord};
use tinypilot_core::records::{BountyDocument, CodeDocument, SourceDocument, TutorialDocument};
use tinypilot_core::store::VectorStore;

use crate::config::{Config, SourcesConfig};
use crate::embedding::create_embedder;
use crate::progress::{self, IndexProgressEvent, IndexProgressReporter, NoProgress};
use crate::search::warn_foreign_models;
use crate::sqlite_store::SqliteStore;

/// Which source(s) an `index` run covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum IndexTarget {
    Repo,
    Bounties,
    Tutorials,
    All,
}

/// Outcome of one index pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Candidate items found in the source.
    pub seen: usize,
    /// Records embedded and upserted.
    pub indexed: usize,
    /// Items dropped before embedding (empty, unreadable, no description).
    pub skipped: usize,
    /// Stale records deleted. Always 0 without `prune`.
    pub pruned: usize,
}

/// Paths that are never indexed, whatever the configured globs say.
const ALWAYS_EXCLUDED: &[&str] = &[".git/**", "**/.git/**"];

/// CSV column headers of the bounty spreadsheet.
const COL_DESCRIPTION: &str = "Short Description";
const COL_TYPE: &str = "Type";
const COL_VALUE: &str = "Value";
const COL_OWNER: &str = "GitHub Owner";
const COL_LINK: &str = "Link";

static NO_PROGRESS: NoProgress = NoProgress;

pub struct Indexer<'a, S: VectorStore + ?Sized, E: Embedder + ?Sized> {
    store: &'a S,
    embedder: &'a E,
    sources: &'a SourcesConfig,
    batch_size: usize,
    progress: &'a dyn IndexProgressReporter,
}

impl<'a, S: VectorStore + ?Sized, E: Embedder + ?Sized> Indexer<'a, S, E> {
    pub fn new(store: &'a S, embedder: &'a E, sources: &'a SourcesConfig, batch_size: usize) -> Self {
        Self {
            store,
            embedder,
            sources,
            batch_size: batch_size.max(1),
            progress: &NO_PROGRESS,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn IndexProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub async fn index_repo(&self, prune: bool) -> Result<IndexStats> {
        self.discovering(DocType::Code);
        let (docs, skipped) = scan_repo(self.sources)?;
        self.write(DocType::Code, docs, skipped, prune).await
    }

    pub async fn index_bounties(&self, prune: bool) -> Result<IndexStats> {
        self.discovering(DocType::Bounty);
        let (docs, skipped) = read_bounties(&self.sources.bounties_path)?;
        self.write(DocType::Bounty, docs, skipped, prune).await
    }

    pub async fn index_tutorials(&self, prune: bool) -> Result<IndexStats> {
        self.discovering(DocType::Tutorial);
        let (docs, skipped) = scan_tutorials(&self.sources.tutorials_dir)?;
        self.write(DocType::Tutorial, docs, skipped, prune).await
    }

    /// Run the requested target(s); `All` runs repo, bounties, tutorials in order.
    pub async fn index(&self, target: IndexTarget, prune: bool) -> Result<Vec<(DocType, IndexStats)>> {
        let mut out = Vec::new();
        if matches!(target, IndexTarget::Repo | IndexTarget::All) {
            out.push((DocType::Code, self.index_repo(prune).await?));
        }
        if matches!(target, IndexTarget::Bounties | IndexTarget::All) {
            out.push((DocType::Bounty, self.index_bounties(prune).await?));
        }
        if matches!(target, IndexTarget::Tutorials | IndexTarget::All) {
            out.push((DocType::Tutorial, self.index_tutorials(prune).await?));
        }
        Ok(out)
    }

    fn discovering(&self, doc_type: DocType) {
        self.progress.report(IndexProgressEvent::Discovering {
            source: source_label(doc_type).to_string(),
        });
    }

    async fn write(
        &self,
        doc_type: DocType,
        docs: Vec<SourceDocument>,
        skipped: usize,
        prune: bool,
    ) -> Result<IndexStats> {
        let mut stats = IndexStats {
            seen: docs.len() + skipped,
            skipped,
            ..Default::default()
        };

        let records: Vec<DocumentRecord> = docs.into_iter().map(SourceDocument::into_record).collect();
        let total = records.len() as u64;
        let mut written: HashSet<String> = HashSet::with_capacity(records.len());

        for batch in records.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.document.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .with_context(|| format!("Failed to embed {} batch", source_label(doc_type)))?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            let dims = self.embedder.dims();
            if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
                bail!(
                    "Embedding model '{}' returned {}-dimensional vectors but is configured for {}; \
                     check embedding.dims",
                    self.embedder.model_name(),
                    v.len(),
                    dims
                );
            }
            self.store.upsert(batch, &vectors).await?;

            written.extend(batch.iter().map(|r| r.id.clone()));
            stats.indexed += batch.len();
            self.progress.report(IndexProgressEvent::Embedding {
                source: source_label(doc_type).to_string(),
                n: stats.indexed as u64,
                total,
            });
        }

        if prune {
            let stale: Vec<String> = self
                .store
                .ids(doc_type)
                .await?
                .into_iter()
                .filter(|id| !written.contains(id))
                .collect();
            if !stale.is_empty() {
                stats.pruned = self.store.delete(&stale).await?;
            }
        }

        tracing::info!(
            source = source_label(doc_type),
            seen = stats.seen,
            indexed = stats.indexed,
            skipped = stats.skipped,
            pruned = stats.pruned,
            "index pass complete"
        );
        Ok(stats)
    }
}

/// `tinypilot index <target> [--prune]`.
pub async fn run_index(config: &Config, target: IndexTarget, prune: bool) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteStore::open(config, embedder.model_name()).await?;
    warn_foreign_models(&store).await;
    let reporter = progress::reporter_for_tty();

    let indexer = Indexer::new(
        &store,
        embedder.as_ref(),
        &config.sources,
        config.embedding.batch_size,
    )
    .with_progress(reporter.as_ref());
    let results = indexer.index(target, prune).await;
    let total = store.count().await;
    store.pool().close().await;

    for (doc_type, stats) in results? {
        println!(
            "index {}: {} seen, {} indexed, {} skipped{}",
            source_label(doc_type),
            stats.seen,
            stats.indexed,
            stats.skipped,
            if prune {
                format!(", {} pruned", stats.pruned)
            } else {
                String::new()
            }
        );
    }
    println!("collection {}: {} records", config.db.collection, total?);
    Ok(())
}

/// Name of the source a document type is read from, as used on the CLI.
pub fn source_label(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Code => "repo",
        DocType::Bounty => "bounties",
        DocType::Tutorial => "tutorials",
    }
}

/// Walk the repository checkout. Returns documents sorted by path plus the
/// number of matching files skipped as empty or non-UTF-8.
pub fn scan_repo(sources: &SourcesConfig) -> Result<(Vec<SourceDocument>, usize)> {
    let root = &sources.repo_path;
    if !root.is_dir() {
        bail!("Repository path does not exist: {}", root.display());
    }

    let include_set = build_globset(&sources.include_globs)?;
    let mut excludes: Vec<String> = ALWAYS_EXCLUDED.iter().map(|s| s.to_string()).collect();
    excludes.extend(sources.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut docs = Vec::new();
    let mut skipped = 0;

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => {
                tracing::debug!(path = %rel_str, "skipping non-UTF-8 file");
                skipped += 1;
                continue;
            }
        };
        if content.trim().is_empty() {
            skipped += 1;
            continue;
        }

        docs.push(SourceDocument::Code(CodeDocument {
            path: rel_str,
            content,
        }));
    }

    docs.sort_by(|a, b| a.record_id().cmp(&b.record_id()));
    Ok((docs, skipped))
}

/// Parse the bounty CSV. Rows without a description are skipped with a warning.
pub fn read_bounties(path: &Path) -> Result<(Vec<SourceDocument>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open bounty CSV: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let Some(desc_col) = column(COL_DESCRIPTION) else {
        bail!(
            "Bounty CSV {} has no '{}' column",
            path.display(),
            COL_DESCRIPTION
        );
    };
    let type_col = column(COL_TYPE);
    let value_col = column(COL_VALUE);
    let owner_col = column(COL_OWNER);
    let link_col = column(COL_LINK);

    let mut docs = Vec::new();
    let mut skipped = 0;

    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV row {}", row + 1))?;
        let field = |col: Option<usize>| {
            col.and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let Some(description) = field(Some(desc_col)) else {
            tracing::warn!(row, "bounty row has no description, skipping");
            skipped += 1;
            continue;
        };

        docs.push(SourceDocument::Bounty(BountyDocument {
            row,
            description,
            bounty_type: field(type_col),
            value: field(value_col),
            owner: field(owner_col),
            link: field(link_col),
        }));
    }

    Ok((docs, skipped))
}

/// Read every `*.txt` file directly inside `dir`, sorted by filename.
pub fn scan_tutorials(dir: &Path) -> Result<(Vec<SourceDocument>, usize)> {
    if !dir.is_dir() {
        bail!("Tutorials directory does not exist: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    let mut docs = Vec::new();
    let mut skipped = 0;
    for path in paths {
        let filename = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(s) if !s.trim().is_empty() => s,
            Ok(_) => {
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "skipping unreadable tutorial");
                skipped += 1;
                continue;
            }
        };
        docs.push(SourceDocument::Tutorial(TutorialDocument { filename, content }));
    }

    Ok((docs, skipped))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sources_in(dir: &Path) -> SourcesConfig {
        SourcesConfig {
            repo_path: dir.join("repo"),
            include_globs: vec!["**/*.py".to_string(), "**/*.md".to_string()],
            exclude_globs: vec!["**/test_*.py".to_string()],
            bounties_path: dir.join("bounties.csv"),
            tutorials_dir: dir.join("tutorials"),
        }
    }

    #[test]
    fn test_scan_repo_filters() {
        let tmp = TempDir::new().unwrap();
        let sources = sources_in(tmp.path());
        let repo = &sources.repo_path;
        fs::create_dir_all(repo.join("tinygrad/nn")).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join("tinygrad/tensor.py"), "class Tensor: pass").unwrap();
        fs::write(repo.join("tinygrad/nn/optim.py"), "def SGD(): pass").unwrap();
        fs::write(repo.join("tinygrad/nn/test_optim.py"), "assert True").unwrap();
        fs::write(repo.join("README.md"), "# tinygrad").unwrap();
        fs::write(repo.join("empty.py"), "  \n").unwrap();
        fs::write(repo.join("setup.cfg"), "[metadata]").unwrap();
        fs::write(repo.join(".git/HEAD.md"), "ref").unwrap();
        fs::write(repo.join("blob.py"), [0xffu8, 0xfe, 0x00]).unwrap();

        let (docs, skipped) = scan_repo(&sources).unwrap();
        let ids: Vec<String> = docs.iter().map(|d| d.record_id()).collect();
        assert_eq!(
            ids,
            vec![
                "repo_README.md",
                "repo_tinygrad/nn/optim.py",
                "repo_tinygrad/tensor.py"
            ]
        );
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_scan_repo_missing_root() {
        let tmp = TempDir::new().unwrap();
        let sources = sources_in(tmp.path());
        assert!(scan_repo(&sources).is_err());
    }

    #[test]
    fn test_read_bounties() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bounties.csv");
        fs::write(
            &path,
            "Short Description,Type,Value,GitHub Owner,Link\n\
             Speed up conv2d,Speed,500,alice,https://github.com/x/1\n\
             ,Feature,100,,\n\
             Port to WebGPU,Feature,$1000,,\n",
        )
        .unwrap();

        let (docs, skipped) = read_bounties(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(skipped, 1);

        let first = docs[0].clone().into_record();
        assert_eq!(first.id, "bounty_0");
        assert_eq!(first.metadata.value.as_deref(), Some("$500"));
        assert!(first.document.contains("GitHub Owner: alice"));

        let second = docs[1].clone().into_record();
        assert_eq!(second.id, "bounty_2");
        assert!(!second.document.contains("GitHub Owner"));
        assert!(!second.document.contains("Link"));
    }

    #[test]
    fn test_read_bounties_without_optional_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bounties.csv");
        fs::write(&path, "Short Description,Type,Value\nFix bug,Bugfix,200\n").unwrap();

        let (docs, _) = read_bounties(&path).unwrap();
        let rec = docs[0].clone().into_record();
        assert_eq!(rec.metadata.bounty_type.as_deref(), Some("Bugfix"));
        assert_eq!(rec.metadata.value.as_deref(), Some("$200"));
    }

    #[test]
    fn test_read_bounties_requires_description_column() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bounties.csv");
        fs::write(&path, "Title,Value\nx,1\n").unwrap();
        assert!(read_bounties(&path).is_err());
    }

    struct ShortEmbedder;

    #[async_trait::async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_dims_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let sources = sources_in(tmp.path());
        fs::create_dir_all(&sources.tutorials_dir).unwrap();
        fs::write(sources.tutorials_dir.join("intro.txt"), "Getting started").unwrap();

        let store = tinypilot_core::store::memory::InMemoryStore::new();
        let err = Indexer::new(&store, &ShortEmbedder, &sources, 8)
            .index_tutorials(false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("configured for 4"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_scan_tutorials() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("tutorials");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b_kernels.txt"), "Kernel fusion").unwrap();
        fs::write(dir.join("a_intro.txt"), "Getting started").unwrap();
        fs::write(dir.join("notes.md"), "not a tutorial").unwrap();
        fs::write(dir.join("nested/deep.txt"), "ignored").unwrap();

        let (docs, skipped) = scan_tutorials(&dir).unwrap();
        let ids: Vec<String> = docs.iter().map(|d| d.record_id()).collect();
        assert_eq!(ids, vec!["tutorial_a_intro.txt", "tutorial_b_kernels.txt"]);
        assert_eq!(skipped, 0);
    }
}
