//! TOML configuration.
//!
//! The whole application is driven by one [`Config`] built at startup and
//! passed by reference. Secrets are read from the environment exactly once,
//! in [`Config::resolve_secrets`]; nothing below `main` touches the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use tinypilot_core::retriever::{RetrievalParams, DEFAULT_TOP_K};

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Name of the vector collection; must stay stable across runs.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            collection: default_collection(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/tinypilot.sqlite")
}
fn default_collection() -> String {
    "tinygrad_data".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Code/bounty candidates fetched for general queries.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_bounty_pool")]
    pub bounty_pool: usize,
    #[serde(default = "default_bounty_limit")]
    pub bounty_limit: usize,
    #[serde(default = "default_tutorial_pool")]
    pub tutorial_pool: usize,
    /// Cap on documents placed in the prompt for general queries.
    #[serde(default)]
    pub context_limit: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            bounty_pool: default_bounty_pool(),
            bounty_limit: default_bounty_limit(),
            tutorial_pool: default_tutorial_pool(),
            context_limit: None,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_bounty_pool() -> usize {
    100
}
fn default_bounty_limit() -> usize {
    20
}
fn default_tutorial_pool() -> usize {
    10
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            bounty_pool: self.bounty_pool,
            bounty_limit: self.bounty_limit,
            tutorial_pool: self.tutorial_pool,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `openai`, or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for Ollama.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Filled from the environment by [`Config::resolve_secrets`].
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Filled from the environment by [`Config::resolve_secrets`].
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini-2024-07-18".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Local checkout of the tinygrad repository.
    #[serde(default = "default_repo_path")]
    pub repo_path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Bounty spreadsheet exported as CSV.
    #[serde(default = "default_bounties_path")]
    pub bounties_path: PathBuf,
    /// One `.txt` file per tutorial page.
    #[serde(default = "default_tutorials_dir")]
    pub tutorials_dir: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            bounties_path: default_bounties_path(),
            tutorials_dir: default_tutorials_dir(),
        }
    }
}

fn default_repo_path() -> PathBuf {
    PathBuf::from("./data/tinygrad")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.py".to_string(), "**/*.md".to_string()]
}
fn default_bounties_path() -> PathBuf {
    PathBuf::from("./data/bounties.csv")
}
fn default_tutorials_dir() -> PathBuf {
    PathBuf::from("./data/tutorials")
}

impl EmbeddingConfig {
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "openai" => "text-embedding-3-small".to_string(),
            "ollama" => "nomic-embed-text".to_string(),
            _ => "all-minilm-l6-v2".to_string(),
        })
    }
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Copy secrets from `lookup` (the process environment in `main`).
    pub fn resolve_secrets<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup(OPENAI_API_KEY_ENV).filter(|k| !k.trim().is_empty());
        self.llm.api_key = key.clone();
        self.embedding.api_key = key;
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.collection.trim().is_empty() {
        bail!("db.collection must not be empty");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.bounty_limit == 0 || config.retrieval.bounty_pool == 0 {
        bail!("retrieval.bounty_pool and retrieval.bounty_limit must be >= 1");
    }
    if config.retrieval.context_limit == Some(0) {
        bail!("retrieval.context_limit must be >= 1 when set");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "local" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }

    if config.embedding.provider != "local"
        && (config.embedding.dims.is_none() || config.embedding.dims == Some(0))
    {
        bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    Ok(())
}
