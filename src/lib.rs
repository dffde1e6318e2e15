//! # tinypilot
//!
//! A retrieval-augmented assistant for the tinygrad codebase, its bounty
//! spreadsheet, and community tutorials.
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │ repo / CSV / │──▶│  Indexer  │──▶│  SQLite  │
//! │  tutorials   │   │  (embed)  │   │ records  │
//! └──────────────┘   └───────────┘   └────┬─────┘
//!                                         │
//!                   ┌─────────────────────┘
//!                   ▼
//!             ┌───────────┐   ┌───────────┐   ┌──────────┐
//!  query ───▶ │ Retriever │──▶│ Generator │──▶│  answer  │
//!             └───────────┘   └───────────┘   └──────────┘
//! ```
//!
//! Retrieval, prompting, and the store abstraction live in `tinypilot-core`;
//! this crate supplies the concrete adapters and the CLI.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and secrets |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`embedding`] | OpenAI, Ollama, and local embedders |
//! | [`llm`] | OpenAI chat model |
//! | [`indexer`] | Repo, bounty, and tutorial indexing |
//! | [`progress`] | Index progress on stderr |
//! | [`interface`] | `ask` and the chat loop |
//! | [`transcript`] | Question/answer log |
//! | [`search`] | `search` command |
//! | [`get`] | `get` command |
//! | [`stats`] | `stats` command |

pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod indexer;
pub mod interface;
pub mod llm;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod stats;
pub mod transcript;
