//! # tinypilot CLI
//!
//! ```bash
//! tinypilot --config ./config/tinypilot.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tinypilot init` | Create the SQLite database and schema |
//! | `tinypilot index <repo\|bounties\|tutorials\|all>` | Embed and store a source |
//! | `tinypilot search "<query>"` | Show the ranked retrieval for a query |
//! | `tinypilot ask "<query>"` | Answer one question |
//! | `tinypilot chat` | Interactive question loop |
//! | `tinypilot history` | Show recent questions and answers |
//! | `tinypilot get <id>` | Dump one stored record |
//! | `tinypilot stats` | Record counts per type |
//!
//! `ask` and `chat` need `OPENAI_API_KEY` in the environment. Set `RUST_LOG`
//! (e.g. `RUST_LOG=tinypilot=debug`) for diagnostics on stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tinypilot::config::{self, OPENAI_API_KEY_ENV};
use tinypilot::indexer::{self, IndexTarget};
use tinypilot::{get, interface, migrate, search, stats, transcript};

/// tinypilot: a retrieval-augmented assistant for the tinygrad codebase,
/// its bounties, and community tutorials.
#[derive(Parser)]
#[command(
    name = "tinypilot",
    about = "Ask questions about tinygrad code, bounties, and tutorials",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means built-in defaults.
    #[arg(long, global = true, default_value = "./config/tinypilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema. Safe to run repeatedly.
    Init,

    /// Embed a source into the collection.
    ///
    /// Re-running is idempotent: records are upserted by id.
    Index {
        #[arg(value_enum)]
        target: IndexTarget,

        /// Delete stored records of the indexed type(s) that were not written in this pass.
        #[arg(long)]
        prune: bool,
    },

    /// Print the ranked documents a query retrieves, without calling the LLM.
    Search {
        query: String,

        /// Code/bounty candidates for general queries.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a single question.
    Ask { query: String },

    /// Start an interactive session. `exit` quits, `clear` starts over.
    Chat,

    /// Print recent questions and answers.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print a stored record as JSON.
    Get { id: String },

    /// Show what is indexed.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load_or_default(&cli.config)?;
    cfg.resolve_secrets(|key| std::env::var(key).ok());

    if matches!(cli.command, Commands::Ask { .. } | Commands::Chat) && cfg.llm.api_key.is_none() {
        eprintln!("Error: {} environment variable is not set.", OPENAI_API_KEY_ENV);
        eprintln!("Set it before running this command, for example:");
        eprintln!("  export {}=sk-...", OPENAI_API_KEY_ENV);
        std::process::exit(1);
    }

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Index { target, prune } => {
            indexer::run_index(&cfg, target, prune).await?;
        }
        Commands::Search { query, top_k } => {
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            search::run_search(&cfg, &query, top_k).await?;
        }
        Commands::Ask { query } => {
            interface::run_ask(&cfg, &query).await?;
        }
        Commands::Chat => {
            interface::run_chat(&cfg).await?;
        }
        Commands::History { limit } => {
            transcript::run_history(&cfg, limit).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
