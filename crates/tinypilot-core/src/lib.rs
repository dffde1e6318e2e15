//! # tinypilot core
//!
//! Runtime-agnostic logic for tinypilot: the document model, query
//! classification, the vector store and embedder abstractions, the
//! retrieval/ranking algorithm, and prompt assembly for answer generation.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! `tinypilot` app crate supplies concrete stores, embedding providers,
//! and the chat model client.
//!
//! ```text
//! SourceDocument ──▶ DocumentRecord ──▶ VectorStore
//!                                          │
//!             query ──▶ classify ──▶ Retriever ──▶ Generator ──▶ answer
//! ```

pub mod classify;
pub mod embedding;
pub mod generator;
pub mod models;
pub mod records;
pub mod retriever;
pub mod store;
