//! Core data models used throughout ragdex.
//!
//! These types represent the documents, chunks, and sync/answer results that
//! flow through the indexing and question-answering pipeline.

use serde::Serialize;

/// One loaded source unit: a single page of a PDF file.
///
/// Documents live for the duration of one indexing pass; only the chunks
/// derived from them are persisted.
#[derive(Debug, Clone)]
pub struct Document {
    /// Extracted page text.
    pub content: String,
    /// Path of the source file, relative to the corpus root.
    pub source: String,
    /// 1-based page number within the source file.
    pub page: i64,
}

/// A bounded text segment derived from a document — the atomic unit of
/// indexing.
///
/// Identity for sync purposes is [`Chunk::key`], a deterministic hash of
/// source path and content (not the path alone: two versions of a document
/// share a path but must not collide, and identical text in two documents
/// must not falsely dedup).
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Content hash identifying this chunk; doubles as the vector-store id.
    pub key: String,
    /// Chunk text.
    pub content: String,
    /// Path of the source file; also the record group id.
    pub source: String,
    /// 1-based page number the chunk was cut from.
    pub page: i64,
}

/// Policy governing which previously-indexed items are deleted during a
/// sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    /// No deletions; the index only grows.
    None,
    /// Delete stale chunks of re-ingested documents (group-scoped, safe for
    /// partial batches).
    Incremental,
    /// Treat the batch as the complete desired state of the namespace.
    Full,
    /// Like `Full`, but the desired-state contract applies per source group.
    ScopedFull,
}

impl CleanupMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "incremental" => Some(Self::Incremental),
            "full" => Some(Self::Full),
            "scoped_full" => Some(Self::ScopedFull),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Incremental => "incremental",
            Self::Full => "full",
            Self::ScopedFull => "scoped_full",
        }
    }
}

/// Counters returned from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Chunks embedded and written this pass.
    pub added: u64,
    /// Chunks whose key was already in the ledger; no embedding call made.
    pub skipped: u64,
    /// Stale entries removed by the cleanup policy.
    pub deleted: u64,
    /// Chunks dropped by per-chunk embedding or write failures.
    pub failed: u64,
}

/// A citation surfaced with an answer, derived 1:1 from a retrieved chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub page: i64,
}

/// Result of one question through the retrieval-generation pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}
