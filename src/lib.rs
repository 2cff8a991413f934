//! # Ragdex
//!
//! A local-first retrieval-augmented question answering engine over a
//! directory of PDFs.
//!
//! Ragdex keeps a SQLite vector index synchronized with a PDF corpus using a
//! content-hash ledger: unchanged chunks are never re-embedded, and chunks
//! whose source left the corpus are cleaned up according to a configurable
//! policy. Questions are answered by retrieving the most similar chunks and
//! asking an LLM to respond from that context, with page-level source
//! citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │ PDF dir  │──▶│ Chunk + Hash │──▶│ Sync engine    │
//! │ (watch)  │   │              │   │ ledger ⟷ store │
//! └──────────┘   └──────────────┘   └──────┬────────┘
//!                                          │
//!                       ┌──────────────────┘
//!                       ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │ Retrieve │──────▶│ Generate │
//!                 │ (top-k)  │       │  (LLM)   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragdex init                   # create databases
//! ragdex index                  # one synchronization pass
//! ragdex watch                  # keep the index in sync with the corpus
//! ragdex ask "What is covered in chapter 3?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`loader`] | Recursive PDF corpus loader |
//! | [`chunk`] | Text chunking and content-hash keys |
//! | [`record_manager`] | Ledger of indexed chunk keys |
//! | [`vector_store`] | SQLite-backed vector store |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | LLM chat abstraction |
//! | [`sync`] | Incremental index synchronization |
//! | [`pipeline`] | Retrieve → generate answering pipeline |
//! | [`indexer`] | End-to-end indexing pass |
//! | [`watch`] | Filesystem watch mode |
//! | [`context`] | Shared application state |
//! | [`db`] | Database connection |

pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod indexer;
pub mod llm;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod record_manager;
pub mod sync;
pub mod vector_store;
pub mod watch;
