//! Incremental index synchronization engine.
//!
//! Given a fresh batch of chunks, computes the diff against the record
//! ledger and applies add/skip/delete operations to the vector store and the
//! ledger, honoring a cleanup policy. The engine is the single writer for
//! its namespace: no other process may mutate the namespace's records or
//! entries during a pass.
//!
//! Write ordering keeps the record ⟺ entry invariant restorable: on add the
//! vector entry is written before its record, on delete the entry is removed
//! before its record. A crash mid-pass can leave an entry without a record,
//! never a record without an entry; the next completed `Full` pass reconciles
//! store ids against the ledger and removes such orphans.

use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

use crate::embedding::Embedder;
use crate::models::{Chunk, CleanupMode, IndexStats};
use crate::record_manager::RecordManager;
use crate::vector_store::{Entry, VectorStore};

pub struct SyncEngine<'a> {
    records: &'a RecordManager,
    store: &'a dyn VectorStore,
    embedder: &'a dyn Embedder,
    embed_batch_size: usize,
    /// Permit `Full` cleanup to sweep a non-empty namespace from an empty
    /// batch.
    allow_empty_sweep: bool,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        records: &'a RecordManager,
        store: &'a dyn VectorStore,
        embedder: &'a dyn Embedder,
        embed_batch_size: usize,
        allow_empty_sweep: bool,
    ) -> Self {
        Self {
            records,
            store,
            embedder,
            embed_batch_size: embed_batch_size.max(1),
            allow_empty_sweep,
        }
    }

    /// Run one sync pass over `chunks`.
    ///
    /// Chunks whose key is already in the ledger are skipped without an
    /// embedding call; their records are re-stamped so cleanup does not
    /// sweep them. Per-chunk embedding or write failures drop that chunk
    /// only. A ledger failure aborts the pass.
    pub async fn sync(&self, chunks: &[Chunk], cleanup: CleanupMode) -> Result<IndexStats> {
        let index_start = self.records.now();
        let mut stats = IndexStats::default();

        if chunks.is_empty() && cleanup == CleanupMode::Full {
            let existing = self.store.count().await?;
            if existing > 0 && !self.allow_empty_sweep {
                bail!(
                    "Refusing to delete all {} indexed entries for an empty batch. \
                     Set sync.allow_empty_sweep = true if the corpus is intentionally empty.",
                    existing
                );
            }
        }

        // Dedup the batch by key; first occurrence wins.
        let mut seen = HashSet::new();
        let batch: Vec<&Chunk> = chunks.iter().filter(|c| seen.insert(c.key.clone())).collect();

        let keys: Vec<String> = batch.iter().map(|c| c.key.clone()).collect();
        let exists = self.records.exists(&keys).await?;

        let mut to_embed: Vec<&Chunk> = Vec::new();
        let mut skipped_keys: Vec<String> = Vec::new();
        let mut skipped_groups: Vec<Option<String>> = Vec::new();

        for (chunk, exists) in batch.iter().zip(exists.iter()) {
            if *exists {
                skipped_keys.push(chunk.key.clone());
                skipped_groups.push(Some(chunk.source.clone()));
                stats.skipped += 1;
            } else {
                to_embed.push(chunk);
            }
        }

        // Re-stamp skipped records so time-based cleanup leaves them alone.
        if !skipped_keys.is_empty() {
            self.records
                .upsert(&skipped_keys, &skipped_groups, self.records.now())
                .await?;
        }

        for embed_batch in to_embed.chunks(self.embed_batch_size) {
            let texts: Vec<String> = embed_batch.iter().map(|c| c.content.clone()).collect();

            let vectors = match self.embedder.embed(&texts).await {
                Ok(v) if v.len() == embed_batch.len() => v,
                Ok(v) => {
                    warn!(
                        expected = embed_batch.len(),
                        got = v.len(),
                        "embedding batch returned wrong cardinality; dropping batch"
                    );
                    stats.failed += embed_batch.len() as u64;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, chunks = embed_batch.len(), "embedding batch failed");
                    stats.failed += embed_batch.len() as u64;
                    continue;
                }
            };

            let entries: Vec<Entry> = embed_batch
                .iter()
                .zip(vectors.into_iter())
                .map(|(chunk, vector)| Entry::from_chunk(chunk, vector))
                .collect();

            // Entry before record: a record must never point at a missing
            // entry.
            if let Err(e) = self.store.upsert(&entries).await {
                warn!(error = %e, chunks = embed_batch.len(), "vector store upsert failed");
                stats.failed += embed_batch.len() as u64;
                continue;
            }

            let batch_keys: Vec<String> = embed_batch.iter().map(|c| c.key.clone()).collect();
            let batch_groups: Vec<Option<String>> = embed_batch
                .iter()
                .map(|c| Some(c.source.clone()))
                .collect();
            self.records
                .upsert(&batch_keys, &batch_groups, self.records.now())
                .await?;

            stats.added += embed_batch.len() as u64;
        }

        stats.deleted = self.cleanup(&batch, cleanup, index_start).await?;

        info!(
            added = stats.added,
            skipped = stats.skipped,
            deleted = stats.deleted,
            failed = stats.failed,
            cleanup = cleanup.as_str(),
            namespace = self.records.namespace(),
            "sync pass completed"
        );

        Ok(stats)
    }

    async fn cleanup(
        &self,
        batch: &[&Chunk],
        cleanup: CleanupMode,
        index_start: i64,
    ) -> Result<u64> {
        let stale = match cleanup {
            CleanupMode::None => return Ok(0),
            CleanupMode::Full => {
                let mut stale = self.records.list_keys(None, Some(index_start)).await?;
                // An aborted earlier pass may have written an entry and died
                // before its record; such orphans have no ledger row at all,
                // so the timestamp query above never finds them. Reconcile
                // store ids against the ledger to sweep them too.
                let keyed: BTreeSet<String> =
                    self.records.list_keys(None, None).await?.into_iter().collect();
                for id in self.store.list_ids().await? {
                    if !keyed.contains(&id) {
                        stale.push(id);
                    }
                }
                stale
            }
            CleanupMode::Incremental | CleanupMode::ScopedFull => {
                let mut groups: Vec<String> =
                    batch.iter().map(|c| c.source.clone()).collect();
                groups.sort();
                groups.dedup();
                self.records
                    .list_keys(Some(&groups), Some(index_start))
                    .await?
            }
        };

        if stale.is_empty() {
            return Ok(0);
        }

        // Entry before record, mirroring the add path.
        self.store.delete(&stale).await?;
        self.records.delete_keys(&stale).await?;

        Ok(stale.len() as u64)
    }
}
