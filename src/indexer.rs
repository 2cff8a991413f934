//! End-to-end indexing pass: load, chunk, sync.

use anyhow::Result;
use tracing::info;

use crate::chunk::chunk_documents;
use crate::context::AppContext;
use crate::loader::load_documents;
use crate::models::IndexStats;
use crate::sync::SyncEngine;

/// Run one full indexing pass over the configured corpus.
///
/// Loading and chunking failures are fatal (a half-read corpus must not
/// drive cleanup); per-chunk embedding failures are absorbed by the sync
/// engine and surface in [`IndexStats::failed`].
pub async fn run_indexing(ctx: &AppContext) -> Result<IndexStats> {
    let documents = load_documents(&ctx.config.sync)?;
    let chunks = chunk_documents(
        &documents,
        ctx.config.sync.chunk_size,
        ctx.config.sync.chunk_overlap,
    );
    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        source = %ctx.config.sync.source_path.display(),
        "corpus loaded"
    );

    let engine = SyncEngine::new(
        &ctx.records,
        &ctx.store,
        &ctx.embedder,
        ctx.config.embedding.batch_size,
        ctx.config.sync.allow_empty_sweep,
    );
    engine.sync(&chunks, ctx.config.cleanup_mode()).await
}
