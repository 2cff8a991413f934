//! Watch mode: re-index whenever the corpus directory changes.
//!
//! A filesystem watcher pushes relevant events into a bounded channel; a
//! single dispatcher loop drains the channel and runs one indexing pass per
//! wakeup. Events arriving while a pass runs coalesce into a single followup
//! pass, so the index converges without running once per touched file.

use anyhow::{Context as _, Result};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::indexer::run_indexing;

/// Relevant events: create/modify/delete touching at least one `.pdf` path.
fn is_relevant(event: &Event) -> bool {
    let kind_ok = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_ok
        && event.paths.iter().any(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
}

fn build_watcher(source_path: &Path, tx: mpsc::Sender<()>) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) if is_relevant(&event) => {
                // A full send would block the notify thread; a dropped signal
                // is fine because one queued wakeup already covers it.
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "file watcher error"),
        },
        NotifyConfig::default(),
    )
    .context("failed to create file watcher")?;

    watcher
        .watch(source_path, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", source_path.display()))?;

    Ok(watcher)
}

/// Run an initial indexing pass, then block re-indexing on corpus changes
/// until the process is stopped.
pub async fn watch(ctx: &AppContext) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<()>(16);
    let _watcher = build_watcher(&ctx.config.sync.source_path, tx)?;

    info!(
        source = %ctx.config.sync.source_path.display(),
        "watching for corpus changes"
    );

    match run_indexing(ctx).await {
        Ok(stats) => info!(?stats, "initial indexing pass completed"),
        Err(e) => error!(error = %e, "initial indexing pass failed"),
    }

    while rx.recv().await.is_some() {
        // Coalesce everything queued during the previous pass into this one.
        while rx.try_recv().is_ok() {}
        debug!("corpus change detected; re-indexing");

        match run_indexing(ctx).await {
            Ok(stats) => info!(?stats, "indexing pass completed"),
            Err(e) => error!(error = %e, "indexing pass failed"),
        }
    }

    Ok(())
}
